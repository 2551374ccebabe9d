//! Builds every prompt sent to the generation service.
//!
//! Prompts are plain substitution: no escaping, no length limits. Missing
//! inputs interpolate as empty strings. Placeholders are `{name}` and are
//! filled in a single pass, so user text containing braces is never re-expanded.

use crate::models::{Score, SkillsAnalysis};
use crate::templates::TemplateStore;

/// Inputs for one generation call. Never persisted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptContext<'a> {
    pub resume_content: &'a str,
    pub job_description: &'a str,
    pub feedback: &'a str,
    pub latex_code: &'a str,
    pub company_name: &'a str,
}

/// Replaces each `{key}` in `template` with its value in one left-to-right pass.
/// Unknown placeholders are left untouched.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

const FORMAT_TEMPLATE: &str = "
{formatter_prompt}

LaTeX Template
{latex_template}


User Resume Content to Format:
```
{resume_content}
```

{job_section}
";

const FORMAT_JOB_SECTION: &str =
    "\nHere is the job description to tailor the resume:\n```\n{job_description}\n```";

const EVALUATE_TEMPLATE: &str = "
{evaluator_prompt}

JOB DESCRIPTION:
```
{job_description}
```
LATEX RESUME:
```
{latex_code}
```
";

const OPTIMIZE_TEMPLATE: &str = "
{optimizer_prompt}

LaTeX Template Reference:
Use the provided LaTeX template for formatting but do not return the template itself. Instead, apply its formatting principles to the user's resume content.

LaTeX Template:
{latex_template}

Current LaTeX Resume to Optimize:
{latex_code}

Job Description:
{job_description}

Previous Evaluation Feedback (If Available):
{feedback}
";

/// The answer format requested here is the grammar `parsing::parse_skills` reads.
const SKILLS_ANALYSIS_TEMPLATE: &str = "
You are a skilled resume analyzer. Analyze the resume and job description carefully.

Your tasks:
1. First, identify the profession type and required skill categories
2. Extract ALL skills from the resume, including those mentioned in project descriptions and experience
3. Compare with job description requirements
4. Recommend additional skills based on job market standards
5. Identify certifications (both current and recommended)

Format your response EXACTLY as follows:

PROFESSION_TYPE:
[Identify the profession type]

SKILL_CATEGORIES:
- [List main skill categories relevant to the profession]

CURRENT_SKILLS:
Technical Skills:
- [List all technical skills found in resume]
[Other Categories]:
- [List skills for each relevant category]

CURRENT_CERTIFICATIONS:
- [List all certifications mentioned in resume]

MISSING_SKILLS:
- [List skills mentioned in job description but missing from resume]

RECOMMENDED_SKILLS:
Technical Skills:
- [List recommended technical skills]
[Other Categories]:
- [List recommended skills by category]

RECOMMENDED_CERTIFICATIONS:
- [List recommended certifications based on job requirements and industry standards]

IMPORTANT INSTRUCTIONS:
1. Include ALL skills mentioned anywhere in the resume
2. Include skills mentioned in project descriptions and work experience
3. Do not mark a skill as missing if it's mentioned anywhere in the resume
4. Group skills logically by category
5. Be thorough in skill extraction - don't miss any skills

LaTeX Resume:
{latex_code}

Job Description:
{job_description}
";

/// Section skeleton the model must fill in for the skills fragment.
pub const SKILLS_SECTION_SKELETON: &str = r"%-----------SKILLS and CERTIFICATIONS-----------
\section{Professional Skills \& Certifications}
 \begin{itemize}[leftmargin=0.15in, label={}]
    \small{\item{
<SKILLS_BY_CATEGORY>
     \textbf{Certifications}{: <CERTS>}
    }}
 \end{itemize}";

const SKILLS_FORMAT_TEMPLATE: &str = r"
Based on the following skills and certifications analysis for a {profession_type} professional,
generate a CONCISE LaTeX skills section using the exact template below.

Current Skills:
{current_skills}

Current Certifications:
{current_certifications}

Recommended Skills:
{recommended_skills}

Recommended Certifications:
{recommended_certifications}

Use this exact LaTeX template format:
{skeleton}

Requirements:
1. Replace <SKILLS_BY_CATEGORY> with appropriate category sections
2. For each category, use the format: \textbf{Category Name}{: skill1, skill2, etc.} \\
3. Include both current and recommended skills/certifications
4. {recommended_marking}
5. Use appropriate line breaks (\\) between sections
6. Escape any special LaTeX characters
7. ALWAYS include the Certifications section
8. If no certifications are found, add ''No current certifications''
9. Group similar skills together within each category
10. Maintain professional formatting and organization
11. KEEP IT SHORT AND CONCISE - Maximum 4-5 skill categories, 7-10 skills per category
12. Keep the overall length similar to the original skills section
";

const MARK_RECOMMENDED: &str = "Mark recommended skills/certifications with \"(Recommended)\" suffix";
const UNMARKED_RECOMMENDED: &str =
    "Do not mark recommended skills/certifications with any special suffix";

const OPTIMIZATION_RULES: &str = "
1. QUANTIFY IMPACT WITH NUMBERS:
   - Add specific metrics, percentages, dollar amounts, timeframes, and quantities to EVERY bullet point
   - Examples: \"Increased efficiency by 35%\", \"Reduced costs by $50K annually\", \"Managed team of 12 employees\"
   - Even for entry-level positions, find ways to quantify impact (e.g., \"Processed 200+ invoices monthly\")

2. AVOID REPETITIVE ACTION VERBS (CRITICAL):
   - NEVER use the same action verb more than 2 times in the entire resume
   - Use diverse action verbs: Achieved, Accelerated, Boosted, Delivered, Enhanced, Generated, Improved, Led, Optimized, Reduced, Streamlined, Transformed, Developed, Implemented, Executed, Coordinated, Spearheaded, Orchestrated, Pioneered, Established, Designed, Launched, Modernized, Mentored, Negotiated, Resolved, Analyzed, Forecasted
   - AVOID weak verbs: Was responsible for, Helped with, Assisted in, Worked on, Participated in

3. ELIMINATE FILLER WORDS:
   - Remove words that add no value: \"various\", \"several\", \"many\", \"some\", \"different\", \"multiple\", \"numerous\", \"extensive\", \"comprehensive\", \"significant\", \"successful\", \"excellent\", \"results-driven\", \"detail-oriented\", \"team-oriented\"
   - Be concise and direct: \"Led team of 8 developers\" instead of \"Successfully led a team of 8 skilled developers\"

4. OPTIMAL RESUME LENGTH & DEPTH:
   - Target 400-675 words total
   - Use 12-20 bullet points maximum
   - Focus on quality over quantity

5. BULLET POINT STRUCTURE:
   - Use the CAR (Challenge-Action-Result) or STAR (Situation-Task-Action-Result) method
   - Each bullet should show: What you did + How you did it + What was the measurable result

6. ACHIEVEMENT-FOCUSED LANGUAGE:
   - Focus on accomplishments, not just duties
   - Use past tense for completed work, present tense for current role
";

const BASE_RESUME_TEMPLATE: &str = r#"
You are a professional resume writer specializing in ATS-optimized resumes. Create a complete LaTeX resume using ONLY the content provided below.

RESUME CONTENT TO CONVERT:
{resume_content}

TASK: Generate a complete LaTeX document that starts with \documentclass and ends with \end{document}.

CRITICAL RESUME OPTIMIZATION RULES:
{rules}
REQUIREMENTS:
1. Use the exact LaTeX template structure provided below
2. Replace ALL example content (Jake Ryan, jake@su.edu, etc.) with the actual content from the resume
3. Extract the person's name: {name}
4. Extract contact information and place it in the main body
5. Extract education, experience, projects, and skills from the provided content
6. Use proper LaTeX formatting and commands
7. Ensure the document compiles to a PDF
8. Apply ALL optimization rules above to enhance the resume content

LaTeX Template to Use:
{latex_template}

CRITICAL INSTRUCTIONS:
- Start your response with \documentclass[letterpaper,10pt]{article}
- End your response with \end{document}
- Replace "Jake Ryan" with "{name}"
- Replace "jake@su.edu" with the actual email from the resume content
- Do not add explanations or markdown formatting
- Output ONLY the complete LaTeX code

OUTPUT FORMAT: Complete LaTeX document starting with \documentclass and ending with \end{document}
"#;

const ATS_SCORE_TEMPLATE: &str = "
You are an ATS (Applicant Tracking System) specialist. Evaluate the LaTeX resume below and return a single integer ATS score from 1-100. Be strict and apply deductions for any ATS parsing risks. If a JOB DESCRIPTION is provided, weight keyword alignment heavily; if not, evaluate based on general ATS best practices and fidelity to the ORIGINAL CONTENT.

ORIGINAL CONTENT (ground truth of facts/keywords; do not reward invented data):
{original_content}

GENERATED LATEX RESUME (evaluate this):
{latex_code}

OPTIONAL JOB DESCRIPTION (use for keyword matching if present):
{job_description}

SCORING RUBRIC (Total = 100 points):
A) CONTACT INFO - 8 pts: name, professional email, phone, city/state visible in the body.
B) SECTION PRESENCE & ORDER - 8 pts: standard headings, reverse-chronological order.
C) FORMATTING & LAYOUT - 10 pts: single column, no graphics, tables, text boxes or icons.
D) PARSING & TECHNICAL COMPATIBILITY - 8 pts: plain text, consistent Month YYYY dates, plain links.
E) QUANTIFIED IMPACT (CRITICAL) - 20 pts: every bullet carries numbers, percentages, amounts or timeframes.
F) AVOID REPETITIVE ACTION VERBS (CRITICAL) - 15 pts: no action verb used more than 2 times.
G) ELIMINATE FILLER WORDS - 10 pts: deduct for each filler word found.
H) OPTIMAL LENGTH & DEPTH - 8 pts: 400-675 words, 12-20 bullet points.
I) BULLET POINT QUALITY - 8 pts: CAR/STAR structure, accomplishments over duties.
J) SKILLS & KEYWORDS - 5 pts: 6-12 relevant competencies, acronyms expanded once.
K) EDUCATION - 2 pts: degree, institution, graduation month/year.

OUTPUT REQUIREMENT:
Return ONLY a single integer from 1 to 100. No words, no explanations.";

const ATS_IMPROVE_TEMPLATE: &str = "
The following resume has an ATS score of {current_score}/100. Rewrite and improve it to achieve a target score of 90+ (minimum 80) by applying ATS best practices.

ORIGINAL CONTENT (ground truth - do not invent new employers, degrees, or dates):
{original_content}

CURRENT LATEX RESUME (Score: {current_score}/100):
{latex_code}

CRITICAL IMPROVEMENT RULES:
{rules}
7. KEYWORDS & SKILLS
   - Add relevant technical and industry keywords drawn naturally from the ORIGINAL CONTENT.
   - Expand acronyms with full terms at least once (e.g., SQL (Structured Query Language)).
   - Ensure a dedicated \"Skills\" section contains 6-12 competencies.

8. FORMATTING & ATS COMPATIBILITY
   - Keep a single-column layout, standard section headings (Experience, Education, Skills, Projects).
   - Remove tables, graphics, text boxes, multiple columns and icons.
   - Ensure consistent date formatting: Month YYYY - Month YYYY (or Present).

9. PRESERVE ACCURACY
   - Do not fabricate new employers, degrees, or certifications.

OUTPUT REQUIREMENT:
Generate an improved LaTeX resume that uses the same LaTeX structure but integrates all enhancements above.
Do not include explanations. Output only the LaTeX code.
";

const FEEDBACK_IMPROVE_TEMPLATE: &str = "
The following resume has an ATS score of {current_score}/100. Based on the specific user feedback provided below, rewrite and improve the resume to address the exact issues mentioned.

ORIGINAL CONTENT (ground truth - do not invent new employers, degrees, or dates):
{original_content}

CURRENT LATEX RESUME (Score: {current_score}/100):
{latex_code}

USER FEEDBACK TO ADDRESS:
{feedback}

IMPROVEMENT INSTRUCTIONS:
Carefully read the user feedback above and address each specific issue mentioned:
- If feedback mentions repetitive action verbs, replace them with diverse alternatives
- If feedback mentions filler words, remove all specified filler words
- If feedback mentions length issues, reduce word count and bullet points as specified
- If feedback mentions quantification issues, add specific numbers and metrics

Then apply these rules throughout:
{rules}
PRESERVE ACCURACY: do not fabricate new employers, degrees, or certifications; use only information from the original content.

OUTPUT REQUIREMENT:
Generate an improved LaTeX resume that uses the same LaTeX structure but addresses all the specific issues mentioned in the user feedback.
Do not include explanations. Output only the LaTeX code.
";

const COVER_LETTER_TEMPLATE: &str = "
{cover_letter_prompt}

CANDIDATE INFORMATION:
- Name: {name}
- Email: {email}
- Company: {company_name}

RESUME CONTENT (LaTeX format):
{latex_code}

JOB DESCRIPTION:
{job_description}
";

/// Assembles every prompt shape from the loaded templates.
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder<'a> {
    templates: &'a TemplateStore,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(templates: &'a TemplateStore) -> Self {
        Self { templates }
    }

    /// Plain-text résumé → LaTeX, tailored when a job description is present.
    pub fn format(&self, ctx: &PromptContext<'_>) -> String {
        let job_section = if ctx.job_description.trim().is_empty() {
            String::new()
        } else {
            fill(
                FORMAT_JOB_SECTION,
                &[("job_description", ctx.job_description)],
            )
        };

        fill(
            FORMAT_TEMPLATE,
            &[
                ("formatter_prompt", &self.templates.formatter_prompt),
                ("latex_template", &self.templates.latex_template),
                ("resume_content", ctx.resume_content),
                ("job_section", &job_section),
            ],
        )
    }

    pub fn evaluate(&self, ctx: &PromptContext<'_>) -> String {
        fill(
            EVALUATE_TEMPLATE,
            &[
                ("evaluator_prompt", &self.templates.evaluator_prompt),
                ("job_description", ctx.job_description),
                ("latex_code", ctx.latex_code),
            ],
        )
    }

    pub fn optimize(&self, ctx: &PromptContext<'_>) -> String {
        fill(
            OPTIMIZE_TEMPLATE,
            &[
                ("optimizer_prompt", &self.templates.optimizer_prompt),
                ("latex_template", &self.templates.latex_template),
                ("latex_code", ctx.latex_code),
                ("job_description", ctx.job_description),
                ("feedback", ctx.feedback),
            ],
        )
    }

    pub fn analyze_skills(&self, ctx: &PromptContext<'_>) -> String {
        fill(
            SKILLS_ANALYSIS_TEMPLATE,
            &[
                ("latex_code", ctx.latex_code),
                ("job_description", ctx.job_description),
            ],
        )
    }

    /// Skills-section prompt. `mark_recommended` asks the model to suffix
    /// recommended items with "(Recommended)".
    pub fn format_skills(&self, analysis: &SkillsAnalysis, mark_recommended: bool) -> String {
        let current_skills = render_categories(&analysis.current_skills_by_category, "");
        let recommended_skills =
            render_categories(&analysis.recommended_skills_by_category, " (Recommended)");
        let current_certifications = analysis.current_certifications.join(", ");
        let recommended_certifications = analysis.recommended_certifications.join(", ");
        let marking = if mark_recommended {
            MARK_RECOMMENDED
        } else {
            UNMARKED_RECOMMENDED
        };

        fill(
            SKILLS_FORMAT_TEMPLATE,
            &[
                ("profession_type", &analysis.profession_type),
                ("current_skills", &current_skills),
                ("current_certifications", &current_certifications),
                ("recommended_skills", &recommended_skills),
                ("recommended_certifications", &recommended_certifications),
                ("skeleton", SKILLS_SECTION_SKELETON),
                ("recommended_marking", marking),
            ],
        )
    }

    /// Job-agnostic ATS rewrite. `name` is the candidate name guessed from the first line.
    pub fn generate_base(&self, ctx: &PromptContext<'_>, name: &str) -> String {
        fill(
            BASE_RESUME_TEMPLATE,
            &[
                ("resume_content", ctx.resume_content),
                ("rules", OPTIMIZATION_RULES),
                ("name", name),
                ("latex_template", &self.templates.latex_template),
            ],
        )
    }

    pub fn score_ats(&self, ctx: &PromptContext<'_>) -> String {
        fill(
            ATS_SCORE_TEMPLATE,
            &[
                ("original_content", ctx.resume_content),
                ("latex_code", ctx.latex_code),
                ("job_description", ctx.job_description),
            ],
        )
    }

    pub fn improve_ats(&self, ctx: &PromptContext<'_>, current: Score) -> String {
        let current_score = current.value().to_string();
        fill(
            ATS_IMPROVE_TEMPLATE,
            &[
                ("current_score", &current_score),
                ("original_content", ctx.resume_content),
                ("latex_code", ctx.latex_code),
                ("rules", OPTIMIZATION_RULES),
            ],
        )
    }

    pub fn improve_with_feedback(&self, ctx: &PromptContext<'_>, current: Score) -> String {
        let current_score = current.value().to_string();
        fill(
            FEEDBACK_IMPROVE_TEMPLATE,
            &[
                ("current_score", &current_score),
                ("original_content", ctx.resume_content),
                ("latex_code", ctx.latex_code),
                ("feedback", ctx.feedback),
                ("rules", OPTIMIZATION_RULES),
            ],
        )
    }

    pub fn cover_letter(&self, ctx: &PromptContext<'_>, name: &str, email: &str) -> String {
        fill(
            COVER_LETTER_TEMPLATE,
            &[
                ("cover_letter_prompt", &self.templates.cover_letter_prompt),
                ("name", name),
                ("email", email),
                ("company_name", ctx.company_name),
                ("latex_code", ctx.latex_code),
                ("job_description", ctx.job_description),
            ],
        )
    }
}

/// `Category:\n- a\n- b<suffix>\n\n` for every non-empty category, in order.
fn render_categories(
    categories: &indexmap::IndexMap<String, Vec<String>>,
    suffix: &str,
) -> String {
    categories
        .iter()
        .filter(|(_, skills)| !skills.is_empty())
        .map(|(category, skills)| format!("{category}:\n- {}{suffix}\n\n", skills.join("\n- ")))
        .collect()
}
