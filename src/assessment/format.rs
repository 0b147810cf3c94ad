use super::StructuredAssessment;

/// Heavy rule wrapped around section titles.
pub const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Render an assessment in the section layout understood by [`super::parse`].
/// Empty sections are left out.
pub fn format(assessment: &StructuredAssessment) -> String {
    let mut sections = Vec::new();

    if !assessment.overview.is_empty() {
        sections.push(section("OVERVIEW", &assessment.overview));
    }
    if !assessment.analysis.is_empty() {
        sections.push(section("ANALYSIS", &assessment.analysis));
    }
    if !assessment.features.is_empty() {
        let body = assessment
            .features
            .iter()
            .map(|feature| {
                let mut block = if feature.id.is_empty() && feature.name.ends_with(')') {
                    // An explicit empty id keeps "Name (x)" from reading as id "x".
                    format!("• {} ()", feature.name)
                } else if feature.id.is_empty() {
                    format!("• {}", feature.name)
                } else {
                    format!("• {} ({})", feature.name, feature.id)
                };
                for line in feature.description.lines() {
                    block.push('\n');
                    if !line.is_empty() {
                        block.push_str("  ");
                        block.push_str(line);
                    }
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(section("FEATURES", &body));
    }

    sections.join("\n")
}

fn section(title: &str, body: &str) -> String {
    format!("{RULE}\n{title}\n{RULE}\n{body}\n")
}
