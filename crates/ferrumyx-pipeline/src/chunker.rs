//! Chunker (C2): split a document body (header already stripped by C3) into
//! overlapping, sentence-boundary-aware windows of bounded token length.

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: crate::config::PipelineDefaults::CHUNK_MAX_TOKENS,
            overlap_tokens: crate::config::PipelineDefaults::CHUNK_OVERLAP_TOKENS,
        }
    }
}

/// One window of the document body, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// Word-count-based token estimate (roughly 0.75 tokens per word for
/// English biomedical prose).
fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    ((words as f64) / 0.75).ceil() as usize
}

/// Split `text` into sentences. A plain heuristic splitter: breaks after
/// `.`, `!`, `?` followed by whitespace, keeping the punctuation attached.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if (c == b'.' || c == b'!' || c == b'?')
            && bytes.get(i + 1).map(|b| b.is_ascii_whitespace()).unwrap_or(true)
        {
            sentences.push(text[start..=i].trim());
            start = i + 1;
        }
        i += 1;
    }
    if start < text.len() {
        let rest = text[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest);
        }
    }
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Chunk a document body into overlapping windows. Output is stable:
/// re-splitting the same body yields the same windows.
pub fn chunk_document(body: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let sentences = split_sentences(body);
    if sentences.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;
    let mut i = 0usize;

    while i < sentences.len() {
        let sentence = sentences[i];
        let sentence_tokens = estimate_tokens(sentence);

        if current_tokens + sentence_tokens > config.max_tokens && !current.is_empty() {
            chunks.push(current.join(" "));

            // Build the overlap tail for the next window by walking backward
            // from the end of the just-closed window until the overlap
            // budget is spent.
            let mut overlap: Vec<&str> = Vec::new();
            let mut overlap_tokens = 0usize;
            for s in current.iter().rev() {
                let t = estimate_tokens(s);
                if overlap_tokens + t > config.overlap_tokens && !overlap.is_empty() {
                    break;
                }
                overlap.push(s);
                overlap_tokens += t;
            }
            overlap.reverse();
            current_tokens = overlap_tokens;
            current = overlap;
        }

        current.push(sentence);
        current_tokens += sentence_tokens;
        i += 1;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk { index, text })
        .collect()
}

/// Strip the first `header_lines` lines from `raw`, returning (header, body).
pub fn split_header(raw: &str, header_lines: usize) -> (String, String) {
    let mut lines = raw.lines();
    let header: Vec<&str> = (&mut lines).take(header_lines).collect();
    let body: Vec<&str> = lines.collect();
    (header.join("\n"), body.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_produces_no_chunks() {
        let config = ChunkerConfig::default();
        assert!(chunk_document("", &config).is_empty());
        assert!(chunk_document("   \n\n  ", &config).is_empty());
    }

    #[test]
    fn short_body_is_a_single_chunk() {
        let config = ChunkerConfig::default();
        let body = "The patient was diagnosed with hypertension. Lisinopril was prescribed.";
        let chunks = chunk_document(body, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn long_body_splits_into_multiple_overlapping_chunks() {
        let config = ChunkerConfig {
            max_tokens: 20,
            overlap_tokens: 5,
        };
        let sentence = "KRAS G12D mutation drives pancreatic ductal adenocarcinoma progression.";
        let body = std::iter::repeat(sentence).take(20).collect::<Vec<_>>().join(" ");
        let chunks = chunk_document(&body, &config);
        assert!(chunks.len() > 1, "expected multiple chunks, got {}", chunks.len());
        for w in chunks.windows(2) {
            assert_eq!(w[1].index, w[0].index + 1);
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let config = ChunkerConfig::default();
        let body = "Expression of TP53 was measured in mouse liver. Results were consistent across replicates. A second cohort confirmed the finding.";
        assert_eq!(chunk_document(body, &config), chunk_document(body, &config));
    }

    #[test]
    fn header_split_respects_line_count() {
        let raw = "title\nauthor\nbody line one\nbody line two";
        let (header, body) = split_header(raw, 2);
        assert_eq!(header, "title\nauthor");
        assert_eq!(body, "body line one\nbody line two");
    }
}
