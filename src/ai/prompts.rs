//! Prompt templates for the task handlers

use crate::task::Language;

/// Instruction telling the model which language to answer in
pub fn language_instruction(language: Language) -> &'static str {
    language.pick(
        "Respond in Estonian (eesti keeles). All text should be in Estonian.",
        "Respond in English. All text should be in English.",
    )
}

/// First `max_chars` characters of `text`
pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Checklist extraction from a grant requirements document
pub fn requirements_prompt(language: Language, document_text: &str) -> String {
    format!(
        r#"{instruction}

You are an expert at analyzing grant application requirements.
Analyze the following grant documentation and extract a comprehensive checklist
of ALL requirements that applicants must fulfill.

For each requirement:
1. Give it a clear, concise name
2. Provide a detailed description of what is needed
3. Indicate if it's mandatory or optional

Include required documents, eligibility criteria, financial, technical,
timeline and reporting requirements.

Document text:
---
{document}
---

Extract all requirements as a structured checklist."#,
        instruction = language_instruction(language),
        document = truncate(document_text, 15_000),
    )
}

/// Evaluation of one project document against the grant requirements
pub fn evaluation_prompt(
    language: Language,
    requirements_text: &str,
    document_name: &str,
    document_text: &str,
) -> String {
    format!(
        r#"{instruction}

You are an expert grant application evaluator.
Evaluate the following document against the grant requirements.

Provide:
1. An overall score from 1-10 (10 being perfect)
2. A brief summary of the evaluation
3. List of strengths
4. List of weaknesses
5. Specific annotations pointing to problematic text segments
6. Actionable recommendations for improvement

Be constructive but thorough. The goal is to help the applicant improve.

GRANT REQUIREMENTS:
---
{requirements}
---

DOCUMENT TO EVALUATE ({name}):
---
{document}
---

Evaluate this document comprehensively."#,
        instruction = language_instruction(language),
        requirements = truncate(requirements_text, 5_000),
        name = document_name,
        document = truncate(document_text, 10_000),
    )
}

/// Extraction of infobit values from an uploaded document
pub fn infobit_extraction_prompt(
    language: Language,
    fields_description: &str,
    document_text: &str,
) -> String {
    let instruction = language.pick(
        "The document is likely in Estonian. Extract values in their original language.",
        "Extract values in their original language from the document.",
    );

    format!(
        r#"{instruction}

You are an expert at extracting structured information from documents.
Analyze the following document and extract values that match the specified fields.

For each field you can find relevant information for:
1. Extract the exact value from the document
2. Provide a confidence score (0.0-1.0)
3. Include the source text snippet (max 100 chars)

Only extract values you are confident about. Do not guess.
If you cannot find information for a field, skip it entirely.

FIELDS TO EXTRACT:
---
{fields}
---

DOCUMENT CONTENT:
---
{document}
---

Extract matching values from the document for as many fields as possible."#,
        instruction = instruction,
        fields = fields_description,
        document = truncate(document_text, 15_000),
    )
}

/// Generation of the infobit fields an application for a grant needs
pub fn infobit_generation_prompt(
    language: Language,
    requirements_text: &str,
    examples_text: &str,
) -> String {
    let instruction = language.pick(
        "Respond in Estonian (eesti keeles). All labels and descriptions should be in Estonian.",
        "Respond in English. All labels and descriptions should be in English.",
    );

    format!(
        r#"{instruction}

You are an expert at analyzing grant applications. Based on the grant requirements
and example documents below, identify ALL the information fields (infobits) that
an applicant needs to provide to complete their application.

For each infobit, provide:
1. field_name: a machine-readable identifier (snake_case, e.g. "company_name")
2. field_label: human-readable label
3. field_label_en: human-readable label in English
4. field_description: help text explaining what information is needed
5. category: one of general, company, project, budget, team, timeline, outcomes
6. is_required: whether this field is mandatory
7. sort_order: display order within the category, starting from 1

GRANT REQUIREMENTS:
---
{requirements}
---

EXAMPLE APPLICATION DOCUMENTS (for reference):
---
{examples}
---

Generate a comprehensive list of all information fields needed for this grant application."#,
        instruction = instruction,
        requirements = truncate(requirements_text, 8_000),
        examples = truncate(examples_text, 8_000),
    )
}

/// Kinds of free-text application content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Narrative,
    Summary,
    Budget,
    CoverLetter,
    ExecutiveSummary,
    Timeline,
    RiskAnalysis,
}

/// Project facts shared by every content prompt
#[derive(Debug, Clone, Copy)]
pub struct ProjectBrief<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub grant_name: &'a str,
}

/// Prompt for one kind of application content
///
/// `documents` are (name, extracted text) pairs of the project's uploads.
pub fn content_prompt(
    language: Language,
    kind: ContentKind,
    brief: &ProjectBrief<'_>,
    requirements_text: &str,
    documents: &[(String, String)],
) -> String {
    let sources = documents
        .iter()
        .map(|(name, text)| format!("=== {} ===\n{}", name, truncate(text, 3_000)))
        .collect::<Vec<_>>()
        .join("\n\n");

    let (task, requirements_limit, sources_limit, closing) = match kind {
        ContentKind::Narrative => (
            "You are an expert grant writer. Based on the project information and uploaded documents,\n\
             write a professional project narrative for a grant application. Describe the goals and\n\
             objectives, explain the methodology, highlight expected outcomes and impact, and address\n\
             the relevant grant requirements.",
            3_000,
            8_000,
            "Write a compelling, professional project narrative.",
        ),
        ContentKind::Summary => (
            "Write a concise executive summary for the following grant application.\n\
             The summary should be 1-2 paragraphs and capture the essence of the project.",
            0,
            5_000,
            "Write a clear, professional executive summary.",
        ),
        ContentKind::Budget => (
            "Based on the project information, suggest a budget breakdown for this grant application.\n\
             Include typical cost categories: personnel, equipment and materials, travel and meetings,\n\
             subcontracting, other direct costs, overhead.",
            0,
            5_000,
            "Provide a reasonable budget breakdown with estimated amounts and justifications.\n\
             Format as a table: Category | Description | Amount (EUR) | Justification",
        ),
        ContentKind::CoverLetter => (
            "Write a formal cover letter for a grant application. Address it appropriately,\n\
             introduce the applicant and the project, explain why the grant is sought, highlight\n\
             key strengths and close formally. Keep it to one page.",
            2_000,
            3_000,
            "Write a professional cover letter.",
        ),
        ContentKind::ExecutiveSummary => (
            "Write an executive summary of at most one page for this grant application. Cover the\n\
             project title and applicant, the problem addressed, the proposed solution, key objectives\n\
             and outcomes, the budget requested, a timeline overview and why the project deserves funding.",
            2_000,
            5_000,
            "Write a compelling executive summary that captures the essence of the project.",
        ),
        ContentKind::Timeline => (
            "Create a project timeline for this grant application. Cover initiation, development,\n\
             testing and validation, implementation, and reporting and closeout phases.\n\
             Use relative months (Month 1, Month 2, ...).",
            2_000,
            3_000,
            "Create a realistic timeline.\n\
             Format as a table: Phase | Activities | Start | End | Deliverables",
        ),
        ContentKind::RiskAnalysis => (
            "Write a risk analysis for this grant application covering technical, operational,\n\
             financial and external risks. For each risk give a description, likelihood\n\
             (High/Medium/Low), impact (High/Medium/Low) and a mitigation strategy.",
            2_000,
            3_000,
            "Provide a thorough risk analysis with mitigation strategies.",
        ),
    };

    let mut prompt = format!(
        "{}\n\n{}\n\nPROJECT: {}\n",
        language_instruction(language),
        task,
        brief.name
    );
    if kind == ContentKind::CoverLetter {
        prompt.push_str(&format!("GRANT: {}\n", brief.grant_name));
    }
    prompt.push_str(&format!("DESCRIPTION: {}\n", brief.description));
    if requirements_limit > 0 {
        prompt.push_str(&format!(
            "\nGRANT REQUIREMENTS:\n{}\n",
            truncate(requirements_text, requirements_limit)
        ));
    }
    prompt.push_str(&format!(
        "\nSOURCE DOCUMENTS:\n{}\n\n{}",
        truncate(&sources, sources_limit),
        closing
    ));
    prompt
}
