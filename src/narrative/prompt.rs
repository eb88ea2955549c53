//! Prompt text for the narrative call

use super::NarrativeRequest;

pub fn system_prompt() -> &'static str {
    "You are a tax and finance consultant for small and medium-sized businesses. \
     You write the prose of a consulting report that is delivered to a client. \
     Do not exaggerate. Mark every figure clearly as an estimate or assumption, \
     but structure the argument persuasively. \
     The report must contain: \
     (1) an Executive Summary; \
     (2) 3 to 5 risks around diligent filing, tax audits, documentation and health insurance; \
     (3) an interpretation of the five-year simulation grounded in its numbers; \
     (4) a three-step roadmap for converting to a corporation; \
     (5) a sentence inviting the client to a consultation; \
     (6) a disclaimer that depreciation, tax credits and reductions, and the owner's \
     salary/dividend structure are not reflected."
}

/// Input summary, projection rows as JSON, and tone
pub fn user_prompt(request: &NarrativeRequest) -> String {
    let rows = serde_json::to_string_pretty(&request.rows).unwrap_or_else(|_| "[]".to_string());

    format!(
        "[Input summary]
- Expected sales this year: {sales} KRW
- Employees (excluding owner): {employees}
- Industry code: {industry_code}
- Estimated income rate (%): {income_rate}
- Current concerns / risks: {concerns}
- Owner insurance class: {class}

[Five-year simulation (raw data)]
{rows}

[Document tone]
{tone}

[Requirements]
- Currency amounts use thousands separators and a unit
- Insert 'estimate/assumption' wording throughout the document
- Close with a sentence inviting a consultation or meeting
",
        sales = request.sales,
        employees = request.employees,
        industry_code = request.industry_code,
        income_rate = request.income_rate,
        concerns = request.concerns,
        class = request.insurance_class.label(),
        rows = rows,
        tone = request.tone.description(),
    )
}
