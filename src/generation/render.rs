use serde::Serialize;
use serde_json::Value;

use crate::analysis::AnalysisResult;
use crate::config::OutputFormat;
use crate::input::{JobDescription, Profile};

const NAME_KEYS: &[&str] = &["name", "full_name", "fullName"];
const HEADLINE_KEYS: &[&str] = &["headline", "summary", "title"];

/// Format-independent document model. Each output format renders from this.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub heading: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionBody {
    Paragraph(String),
    Items(Vec<String>),
}

impl Section {
    fn paragraph(heading: &str, text: impl Into<String>) -> Self {
        Self {
            heading: heading.to_owned(),
            body: SectionBody::Paragraph(text.into()),
        }
    }

    fn items(heading: &str, items: Vec<String>) -> Self {
        Self {
            heading: heading.to_owned(),
            body: SectionBody::Items(items),
        }
    }
}

impl Document {
    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Md => Ok(self.markdown()),
            OutputFormat::Txt => Ok(self.plain_text()),
            OutputFormat::Json => serde_json::to_string_pretty(self).map(|mut s| {
                s.push('\n');
                s
            }),
        }
    }

    fn markdown(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n", section.heading));
            match &section.body {
                SectionBody::Paragraph(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                SectionBody::Items(items) => {
                    for item in items {
                        out.push_str(&format!("- {item}\n"));
                    }
                }
            }
        }
        out
    }

    fn plain_text(&self) -> String {
        let mut out = format!("{}\n{}\n", self.title.to_uppercase(), "=".repeat(self.title.chars().count()));
        for section in &self.sections {
            out.push_str(&format!(
                "\n{}\n{}\n",
                section.heading,
                "-".repeat(section.heading.chars().count())
            ));
            match &section.body {
                SectionBody::Paragraph(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                SectionBody::Items(items) => {
                    for item in items {
                        out.push_str(&format!("* {item}\n"));
                    }
                }
            }
        }
        out
    }
}

pub fn resume(profile: &Profile, analysis: &AnalysisResult) -> Document {
    let mut sections = Vec::new();
    if let Some(headline) = profile.first_str(HEADLINE_KEYS) {
        sections.push(Section::paragraph("Summary", headline));
    }

    let details: Vec<String> = profile
        .fields()
        .iter()
        .filter(|(key, _)| !NAME_KEYS.contains(&key.as_str()) && !HEADLINE_KEYS.contains(&key.as_str()))
        .map(|(key, value)| format!("{}: {}", humanize(key), describe(value)))
        .collect();
    if !details.is_empty() {
        sections.push(Section::items("Background", details));
    }

    if !analysis.gap_analysis().is_empty() {
        sections.push(Section::items(
            "Targeted Keywords",
            analysis.gap_analysis().iter().map(describe).collect(),
        ));
    }
    sections.push(ats_section(analysis));

    Document {
        title: profile.first_str(NAME_KEYS).unwrap_or("Resume").to_owned(),
        sections,
    }
}

pub fn cover_letter(profile: &Profile, job_desc: &JobDescription) -> Document {
    let name = profile.first_str(NAME_KEYS).unwrap_or("The applicant");
    let position = job_desc
        .as_str()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    let mut letter = format!(
        "Dear Hiring Manager,\n\n{name} is applying for the following position: {position}"
    );
    if let Some(headline) = profile.first_str(HEADLINE_KEYS) {
        letter.push_str(&format!("\n\n{headline}"));
    }
    letter.push_str(&format!("\n\nSincerely,\n{name}"));

    Document {
        title: "Cover Letter".to_owned(),
        sections: vec![
            Section::paragraph("Letter", letter),
            Section::paragraph("Job Description", job_desc.as_str()),
        ],
    }
}

pub fn improvement_plan(analysis: &AnalysisResult) -> Document {
    Document {
        title: "Improvement Plan".to_owned(),
        sections: vec![
            Section::items("Gaps", analysis.gap_analysis().iter().map(describe).collect()),
            Section::items(
                "Actions",
                analysis
                    .improvement_plan()
                    .iter()
                    .enumerate()
                    .map(|(i, action)| format!("{}. {}", i + 1, describe(action)))
                    .collect(),
            ),
            ats_section(analysis),
        ],
    }
}

fn ats_section(analysis: &AnalysisResult) -> Section {
    Section::paragraph(
        "ATS Match",
        format!("Estimated ATS score: {}/100", analysis.ats_score()),
    )
}

/// One-line human rendering of an arbitrary JSON value.
fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(describe).collect::<Vec<_>>().join(", "),
        Value::Object(fields) => fields
            .iter()
            .map(|(k, v)| format!("{}: {}", humanize(k), describe(v)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn humanize(key: &str) -> String {
    let spaced = key.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
