//! Proveedor 3b: síntesis de timestamps para letra plana.
//!
//! Si hay clave de OpenAI configurada se pide un timing "realista" al
//! modelo; si no (o si falla), una heurística determinista reparte las
//! líneas entre 5s tras el inicio y 5s antes del final, dando a cada línea
//! un hueco proporcional a su longitud.

use super::LyricLine;
use serde_json::{json, Value};
use tracing::{debug, warn};

const OPENAI_CHAT_API: &str = "https://api.openai.com/v1/chat/completions";

/// Margen típico de intro y outro, en segundos.
const EDGE_MARGIN: f64 = 5.0;

pub async fn generate(
    http: &reqwest::Client,
    openai_key: Option<&str>,
    plain_lyrics: &str,
    duration: f64,
    title: &str,
    artist: &str,
) -> Vec<LyricLine> {
    let lines: Vec<String> = plain_lyrics
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    if lines.is_empty() {
        return Vec::new();
    }

    if let Some(key) = openai_key {
        match generate_with_llm(http, key, &lines, duration, title, artist).await {
            Ok(result) if !result.is_empty() => {
                debug!("✅ {} timestamps generados con LLM", result.len());
                return result;
            }
            Ok(_) => warn!("El LLM no devolvió líneas, usando heurística"),
            Err(e) => warn!("Generación con LLM falló, usando heurística: {}", e),
        }
    }

    generate_heuristic(&lines, duration)
}

/// Reparto determinista: secuencial desde `EDGE_MARGIN`, con el peso de
/// cada línea `0.8 + 0.4 * longitud/longitud_media`, normalizado para que
/// el total cubra exactamente la ventana disponible.
pub(crate) fn generate_heuristic(lines: &[String], duration: f64) -> Vec<LyricLine> {
    if lines.is_empty() {
        return Vec::new();
    }

    let start_time = EDGE_MARGIN;
    let end_time = duration - EDGE_MARGIN;
    let available = (end_time - start_time).max(1.0);

    let avg_len = lines.iter().map(|l| l.len()).sum::<usize>() as f64 / lines.len() as f64;
    let weights: Vec<f64> = lines
        .iter()
        .map(|line| {
            let length_factor = if avg_len > 0.0 {
                line.len() as f64 / avg_len
            } else {
                1.0
            };
            0.8 + 0.4 * length_factor
        })
        .collect();
    let total_weight: f64 = weights.iter().sum();

    let mut result = Vec::with_capacity(lines.len());
    let mut current = start_time;

    for (line, weight) in lines.iter().zip(&weights) {
        result.push(LyricLine {
            time: (current * 100.0).round() / 100.0,
            text: line.clone(),
        });
        current += available * weight / total_weight;
    }

    debug!("✅ {} timestamps generados con heurística", result.len());
    result
}

async fn generate_with_llm(
    http: &reqwest::Client,
    api_key: &str,
    lines: &[String],
    duration: f64,
    title: &str,
    artist: &str,
) -> anyhow::Result<Vec<LyricLine>> {
    let prompt = format!(
        "Generate realistic timestamps for these song lyrics. The song is \
         \"{}\" by {} and has a duration of {} seconds.\n\nLyrics:\n{}\n\n\
         Return a JSON array where each element has:\n\
         - \"time\": timestamp in seconds (float)\n\
         - \"text\": the lyric line\n\n\
         Consider:\n\
         - Natural pacing and rhythm\n\
         - Typical verse/chorus patterns\n\
         - Instrumental breaks\n\
         - Start at 0-5 seconds\n\
         - End before {} seconds\n\
         - Distribute lines realistically (not evenly)\n\n\
         Return ONLY the JSON array, no other text.",
        title,
        artist,
        duration,
        lines.join("\n"),
        duration
    );

    let body = json!({
        "model": "gpt-3.5-turbo",
        "messages": [
            {
                "role": "system",
                "content": "You are a music timing expert. Generate realistic song lyric timestamps."
            },
            { "role": "user", "content": prompt }
        ],
        "temperature": 0.7,
        "max_tokens": 2000
    });

    let response = http
        .post(OPENAI_CHAT_API)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await?
        .error_for_status()?;

    let data: Value = response.json().await?;
    let content = data
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("respuesta del LLM sin contenido"))?
        .trim();

    let parsed: Vec<LyricLine> = serde_json::from_str(strip_code_fences(content))?;
    Ok(parsed)
}

/// El modelo a veces envuelve el JSON en un bloque ```json ... ```.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_heuristic_starts_at_margin() {
        let result = generate_heuristic(&lines(&["one", "two", "three"]), 180.0);
        assert_eq!(result[0].time, 5.0);
    }

    #[test]
    fn test_heuristic_times_are_monotonic_and_within_bounds() {
        let texts: Vec<String> = (0..20).map(|i| format!("line number {}", i)).collect();
        let result = generate_heuristic(&texts, 200.0);

        assert_eq!(result.len(), 20);
        for pair in result.windows(2) {
            assert!(pair[1].time >= pair[0].time);
        }
        // La última línea arranca antes del margen final
        assert!(result.last().unwrap().time < 200.0 - 5.0);
    }

    #[test]
    fn test_heuristic_longer_lines_get_longer_slots() {
        let result = generate_heuristic(
            &lines(&["short", "a very very very much longer lyric line", "short"]),
            180.0,
        );

        let slot_0 = result[1].time - result[0].time;
        let slot_1 = result[2].time - result[1].time;
        assert!(slot_1 > slot_0);
    }

    #[test]
    fn test_heuristic_empty_input() {
        assert!(generate_heuristic(&[], 180.0).is_empty());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("[1,2]"), "[1,2]");
        assert_eq!(strip_code_fences("```json\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fences("```\n[1,2]\n```"), "[1,2]");
    }
}
