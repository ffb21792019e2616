//! Turning retrieval results into text.

use crate::retriever::RetrievalResult;

/// Chunk texts in ranked order, joined by newlines, for the answer prompt.
pub fn assemble(result: &RetrievalResult) -> String {
    result
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable listing of the results, one line per chunk.
pub fn render(result: &RetrievalResult) -> String {
    result
        .iter()
        .enumerate()
        .map(|(rank, r)| {
            let source = r.chunk.source.as_deref().unwrap_or("unknown source");
            let page = r
                .chunk
                .page
                .map(|p| format!("page {}", p))
                .unwrap_or_else(|| "page ?".to_string());
            format!(
                "[{}] ({}, {}, position {}, distance {:.4}): {}",
                rank + 1,
                source,
                page,
                r.chunk.order,
                r.distance,
                r.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::RetrievedChunk;
    use crate::types::Chunk;

    fn result() -> RetrievalResult {
        RetrievalResult {
            chunks: vec![
                RetrievedChunk {
                    chunk: Chunk::new(2, "Mitosis has four phases.", Some("bio.pdf".into()), Some(3), 7)
                        .unwrap(),
                    distance: 0.125,
                },
                RetrievedChunk {
                    chunk: Chunk::new(0, "Cells divide.", None, None, 0).unwrap(),
                    distance: 0.5,
                },
            ],
        }
    }

    #[test]
    fn test_assemble_joins_in_rank_order() {
        assert_eq!(
            assemble(&result()),
            "Mitosis has four phases.\nCells divide."
        );
    }

    #[test]
    fn test_render_formats_metadata() {
        let rendered = render(&result());
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines[0],
            "[1] (bio.pdf, page 3, position 7, distance 0.1250): Mitosis has four phases."
        );
        assert_eq!(
            lines[1],
            "[2] (unknown source, page ?, position 0, distance 0.5000): Cells divide."
        );
    }

    #[test]
    fn test_empty_result() {
        let empty = RetrievalResult::default();
        assert_eq!(assemble(&empty), "");
        assert_eq!(render(&empty), "");
    }
}
