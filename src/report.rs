//! # Console reports
//!
//! Styled terminal output for answers, raw search hits and store status.
//! Everything renders into any `impl Write` through crossterm's queued
//! commands, so the same code drives stdout in the binary and a byte buffer
//! in tests.

use crossterm::{
    QueueableCommand,
    style::{Attribute, Color, Print, SetAttribute, SetForegroundColor},
};
use std::error::Error;
use std::io::Write;

use crate::models::SearchHit;
use crate::pipeline::Answer;
use crate::vector_store::VectorIndex;

fn heading<W: Write>(out: &mut W, text: &str) -> Result<(), Box<dyn Error>> {
    out.queue(SetForegroundColor(Color::Cyan))?
        .queue(SetAttribute(Attribute::Bold))?
        .queue(Print(text))?
        .queue(SetAttribute(Attribute::Reset))?
        .queue(SetForegroundColor(Color::Reset))?
        .queue(Print("\n"))?;
    Ok(())
}

fn dim<W: Write>(out: &mut W, text: &str) -> Result<(), Box<dyn Error>> {
    out.queue(SetForegroundColor(Color::DarkGrey))?
        .queue(Print(text))?
        .queue(SetForegroundColor(Color::Reset))?;
    Ok(())
}

/// Print an [`Answer`]: body, key points, sources and references.
pub fn render_answer<W: Write>(out: &mut W, answer: &Answer) -> Result<(), Box<dyn Error>> {
    heading(out, "Answer")?;
    out.queue(SetForegroundColor(Color::Blue))?
        .queue(Print(&answer.answer))?
        .queue(SetForegroundColor(Color::Reset))?
        .queue(Print("\n"))?;

    if !answer.bullet_points.is_empty() {
        out.queue(Print("\n"))?;
        heading(out, "Key points")?;
        for point in &answer.bullet_points {
            out.queue(Print(format!("  • {point}\n")))?;
        }
    }

    if !answer.sources.is_empty() {
        out.queue(Print("\n"))?;
        heading(out, "Sources")?;
        out.queue(Print(format!("  {}\n", answer.sources.join(", "))))?;
    }

    if !answer.references.is_empty() {
        out.queue(Print("\n"))?;
        heading(out, "References")?;
        for (i, reference) in answer.references.iter().enumerate() {
            out.queue(Print(format!("  [{}] {}\n", i + 1, reference.title)))?;
            dim(out, &format!("      {} · {}\n", reference.source, reference.url))?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Print ranked hits with their scores, best first.
pub fn render_hits<W: Write>(
    out: &mut W,
    query: &str,
    hits: &[SearchHit],
) -> Result<(), Box<dyn Error>> {
    heading(out, &format!("Results for {query:?}"))?;
    if hits.is_empty() {
        dim(out, "  (no documents indexed)\n")?;
        out.flush()?;
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        out.queue(SetForegroundColor(Color::Green))?
            .queue(Print(format!("{:>2}. {:.4}  ", rank + 1, hit.score)))?
            .queue(SetForegroundColor(Color::Reset))?
            .queue(SetAttribute(Attribute::Bold))?
            .queue(Print(&hit.metadata.title))?
            .queue(SetAttribute(Attribute::Reset))?
            .queue(Print("\n"))?;
        dim(
            out,
            &format!(
                "    {} · {} · {}\n",
                hit.metadata.source, hit.metadata.timestamp, hit.metadata.url
            ),
        )?;
    }

    out.flush()?;
    Ok(())
}

/// Print document count, dimension, model and location of the store.
pub fn render_status<W: Write>(out: &mut W, index: &VectorIndex) -> Result<(), Box<dyn Error>> {
    heading(out, "Vector store")?;
    let dimension = match index.dimension() {
        0 => "-".to_string(),
        d => d.to_string(),
    };
    let rows = [
        ("location", index.store_dir().display().to_string()),
        ("model", index.model_id().to_string()),
        ("documents", index.len().to_string()),
        ("dimension", dimension),
    ];
    for (label, value) in rows {
        dim(out, &format!("  {label:<10}"))?;
        out.queue(Print(format!(" {value}\n")))?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::models::{Metadata, Record};
    use tempfile::TempDir;

    fn rendered(f: impl FnOnce(&mut Vec<u8>) -> Result<(), Box<dyn Error>>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_render_answer_lists_sections() {
        let answer = Answer {
            answer: "Rates are up.".to_string(),
            bullet_points: vec!["Fed raises rates".to_string()],
            references: vec![Metadata {
                title: "Fed raises rates".to_string(),
                url: "https://example.com/fed".to_string(),
                source: "Wire".to_string(),
                timestamp: "2024-01-15T10:30:00Z".to_string(),
            }],
            sources: vec!["Wire".to_string(), "Blog".to_string()],
        };
        let text = rendered(|out| render_answer(out, &answer));
        assert!(text.contains("Rates are up."));
        assert!(text.contains("• Fed raises rates"));
        assert!(text.contains("Wire, Blog"));
        assert!(text.contains("[1] Fed raises rates"));
        assert!(text.contains("https://example.com/fed"));
    }

    #[test]
    fn test_render_answer_without_hits_skips_sections() {
        let answer = Answer::from_hits(&[]);
        let text = rendered(|out| render_answer(out, &answer));
        assert!(text.contains("No relevant news found."));
        assert!(!text.contains("Key points"));
        assert!(!text.contains("References"));
    }

    #[test]
    fn test_render_hits_shows_rank_and_score() {
        let hits = vec![SearchHit {
            content: "Fed raises rates\nbody".to_string(),
            metadata: Metadata {
                title: "Fed raises rates".to_string(),
                url: "u1".to_string(),
                source: "Wire".to_string(),
                timestamp: "t".to_string(),
            },
            score: 0.5,
        }];
        let text = rendered(|out| render_hits(out, "rates", &hits));
        assert!(text.contains(" 1. 0.5000"));
        assert!(text.contains("Fed raises rates"));

        let empty = rendered(|out| render_hits(out, "rates", &[]));
        assert!(empty.contains("no documents indexed"));
    }

    #[test]
    fn test_render_status() {
        let dir = TempDir::new().unwrap();
        let mut index = VectorIndex::open_with(dir.path(), Box::new(HashingEmbedder::new(32)), 10);
        let text = rendered(|out| render_status(out, &index));
        assert!(text.contains("hashing-bow-32"));
        assert!(text.contains(" 0\n"));
        assert!(text.contains(" -\n"));

        index
            .add(&[Record::new("Title", "Long enough body text.", "u", "Wire", "t")])
            .unwrap();
        let text = rendered(|out| render_status(out, &index));
        assert!(text.contains(" 1\n"));
        assert!(text.contains(" 32\n"));
    }
}
