//! Step rule table
//!
//! The closed set of step phrases the compiler understands, and the code each
//! one emits. Blocks target the Playwright async API and are rendered at the
//! indentation of the generated `try:` body.

use super::script::{escape_data, BODY_INDENT};

/// What a recognized step turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// Navigate the page to the test data
    Navigate,
    /// Fill the field with the given placeholder text using the test data
    Fill { placeholder: &'static str },
    /// Click the element with the given ARIA role and accessible name
    ClickRole {
        role: &'static str,
        name: &'static str,
    },
    /// Click the element showing the given text
    ClickText { text: &'static str },
    /// Expect the URL to match `pattern` and a heading named `heading`
    ExpectPage {
        pattern: &'static str,
        heading: &'static str,
    },
    /// Expect the given text to be visible
    ExpectText { text: &'static str },
}

impl Emission {
    /// Whether the step's test data ends up in the emitted code
    pub fn uses_data(&self) -> bool {
        matches!(self, Emission::Navigate | Emission::Fill { .. })
    }
}

/// A canonical step phrase (or set of synonyms) and its emission
#[derive(Debug, Clone)]
pub struct StepRule {
    /// Phrases that select this rule, matched exactly
    pub phrases: &'static [&'static str],
    /// Progress message printed by the generated script
    pub announce: &'static str,
    pub emission: Emission,
}

impl StepRule {
    /// Render this rule's block with `data` substituted
    pub fn render(&self, data: &str) -> String {
        let data = if self.emission.uses_data() {
            escape_data(data)
        } else {
            String::new()
        };
        let mut lines = vec![format!("print(\"Step: {}\")", self.announce)];

        match self.emission {
            Emission::Navigate => {
                lines.push(format!("await page.goto(\"{data}\")"));
            }
            Emission::Fill { placeholder } => {
                lines.push(format!(
                    "await page.get_by_placeholder(\"{placeholder}\").fill(\"{data}\")"
                ));
            }
            Emission::ClickRole { role, name } => {
                lines.push(format!(
                    "await page.get_by_role(\"{role}\", name=\"{name}\").click()"
                ));
            }
            Emission::ClickText { text } => {
                lines.push(format!("await page.get_by_text(\"{text}\").click()"));
            }
            Emission::ExpectPage { pattern, heading } => {
                lines.push(format!(
                    "await expect(page).to_have_url(re.compile(r\"{pattern}\"))"
                ));
                lines.push(format!(
                    "expected_heading = page.get_by_role(\"heading\", name=\"{heading}\")"
                ));
                lines.push("await expect(expected_heading).to_be_visible()".to_string());
            }
            Emission::ExpectText { text } => {
                lines.push(format!(
                    "await expect(page.get_by_text(\"{text}\")).to_be_visible()"
                ));
            }
        }

        lines
            .into_iter()
            .map(|line| format!("{BODY_INDENT}{line}\n"))
            .collect()
    }
}

static STEP_RULES: &[StepRule] = &[
    StepRule {
        phrases: &["Given the user is on the OrangeHRM login page"],
        announce: "Navigating to the OrangeHRM login page...",
        emission: Emission::Navigate,
    },
    StepRule {
        phrases: &[
            "When the user enters the username",
            "And enters their username",
        ],
        announce: "Entering username...",
        emission: Emission::Fill {
            placeholder: "Username",
        },
    },
    StepRule {
        phrases: &["And the user enters the password"],
        announce: "Entering password...",
        emission: Emission::Fill {
            placeholder: "Password",
        },
    },
    StepRule {
        phrases: &[
            "And clicks the login button",
            "And clicks the 'Reset Password' button",
        ],
        announce: "Clicking the button...",
        emission: Emission::ClickRole {
            role: "button",
            name: "Login",
        },
    },
    StepRule {
        phrases: &["When the user clicks on 'Forgot your Password?'"],
        announce: "Clicking 'Forgot your Password?'...",
        emission: Emission::ClickText {
            text: "Forgot your Password?",
        },
    },
    StepRule {
        phrases: &["Then the user should be redirected to the dashboard"],
        announce: "Verifying redirection to the dashboard...",
        emission: Emission::ExpectPage {
            pattern: ".*/dashboard/index",
            heading: "Dashboard",
        },
    },
    StepRule {
        phrases: &["Then a password reset link should be sent successfully"],
        announce: "Verifying password reset link...",
        emission: Emission::ExpectText {
            text: "Reset link sent successfully",
        },
    },
];

/// Get all step rules
pub fn all_rules() -> &'static [StepRule] {
    STEP_RULES
}

/// Find the rule for a step phrase
pub fn find_rule(phrase: &str) -> Option<&'static StepRule> {
    STEP_RULES.iter().find(|rule| rule.phrases.contains(&phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrases_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for rule in all_rules() {
            for phrase in rule.phrases {
                assert!(seen.insert(*phrase), "duplicate phrase: {phrase}");
            }
        }
    }

    #[test]
    fn test_find_rule() {
        assert!(find_rule("And enters their username").is_some());
        assert!(find_rule("and enters their username").is_none());
        assert!(find_rule("When the user flies away").is_none());
    }

    #[test]
    fn test_render_fill_substitutes_data() {
        let rule = find_rule("And the user enters the password").unwrap();
        assert_eq!(
            rule.render("admin123"),
            format!(
                "{BODY_INDENT}print(\"Step: Entering password...\")\n\
                 {BODY_INDENT}await page.get_by_placeholder(\"Password\").fill(\"admin123\")\n"
            )
        );
    }

    #[test]
    fn test_render_click_ignores_data() {
        let rule = find_rule("And clicks the login button").unwrap();
        assert!(!rule.emission.uses_data());
        assert_eq!(rule.render("ignored"), rule.render(""));
    }
}
