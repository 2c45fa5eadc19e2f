use crate::error::Result;
use crate::summary::SummaryPayload;

pub const SYSTEM_PROMPT: &str = "Você é um analista sênior de gestão de estoques. \
Escreva em português, em tom executivo e objetivo. Produza um resumo de no máximo \
três parágrafos cobrindo: situação atual do excesso de estoque, tendência observada \
nos períodos informados e dois ou três próximos passos concretos. Não invente números \
além dos fornecidos.";

/// User message carrying the payload as JSON for the model to summarize.
pub fn user_prompt(payload: &SummaryPayload) -> Result<String> {
    let data = serde_json::to_string_pretty(payload)?;
    Ok(format!(
        "Dados da gerência para análise:\n\n{}\n\nGere o resumo executivo.",
        data
    ))
}
