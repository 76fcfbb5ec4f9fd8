//! Fixed parts of a generated script and test-data escaping

/// Indentation of statements inside the generated `try:` block
pub const BODY_INDENT: &str = "            ";

/// Imports, entry point, browser context and the `try:` header
pub const PROLOGUE: &str = concat!(
    "import asyncio\n",
    "import re\n",
    "from playwright.async_api import async_playwright, expect\n",
    "\n",
    "async def run_test():\n",
    "    \"\"\"Test Case for current test ID.\"\"\"\n",
    "    async with async_playwright() as p:\n",
    "        browser = await p.chromium.launch(headless=False)\n",
    "        page = await browser.new_page()\n",
    "        try:\n",
);

/// Success marker, failure marker with cause, browser release, main guard
pub const EPILOGUE: &str = concat!(
    "            print(\"Test Passed - Execution completed successfully.\")\n",
    "        except Exception as e:\n",
    "            print(f\"Test Failed - An error occurred: {str(e)}\")\n",
    "        finally:\n",
    "            await browser.close()\n",
    "\n",
    "if __name__ == \"__main__\":\n",
    "    asyncio.run(run_test())\n",
);

/// Escape test data for a double-quoted Python string literal
///
/// Only backslash, double quote, line feed and carriage return are escaped;
/// everything else is copied through unchanged.
pub fn escape_data(data: &str) -> String {
    let mut out = String::with_capacity(data.len());
    for c in data.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
