//! Document generation collaborator.
//!
//! Generation is the slow part of fulfillment; its latency directly delays
//! shutdown, since the sequencer waits for every document worker to finish.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use subscribe_common::types::{Plan, Subscriber};

use crate::error::DocumentError;

/// Produces a file for `subscriber` inside `dir` and returns its path.
///
/// Each call must return a path no other call returns: a queued notification
/// keeps pointing at its file until the dispatcher has sent it.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(
        &self,
        subscriber: &Subscriber,
        plan: &Plan,
        dir: &Path,
    ) -> Result<PathBuf, DocumentError>;
}

/// Writes a one-page plan manual as a PDF.
#[derive(Debug, Clone)]
pub struct ManualGenerator {
    render_delay: Duration,
}

impl ManualGenerator {
    pub fn new(render_delay: Duration) -> Self {
        Self { render_delay }
    }
}

#[async_trait]
impl DocumentGenerator for ManualGenerator {
    async fn generate(
        &self,
        subscriber: &Subscriber,
        plan: &Plan,
        dir: &Path,
    ) -> Result<PathBuf, DocumentError> {
        tokio::time::sleep(self.render_delay).await;

        let lines = vec![
            format!("{} - User Manual", plan.name),
            String::new(),
            format!("Prepared for {} <{}>", subscriber.full_name(), subscriber.email),
            format!("Monthly price: {}", plan.amount_for_display()),
            String::new(),
            "Thank you for subscribing.".to_string(),
        ];
        let bytes = render_pdf(&lines);

        tokio::fs::create_dir_all(dir).await?;
        let name = format!("{}_{}_{}_manual.pdf", subscriber.id, plan.id, Uuid::new_v4());
        let partial = dir.join(format!(".{}.part", name));
        let path = dir.join(name);

        // Readers only ever see a complete file.
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::debug!(
            subscriber_id = %subscriber.id,
            path = %path.display(),
            "Manual generated"
        );
        Ok(path)
    }
}

/// Minimal single-page PDF with one Helvetica text block.
fn render_pdf(lines: &[String]) -> Vec<u8> {
    let mut content = String::from("BT\n/F1 12 Tf\n72 720 Td\n16 TL\n");
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", escape_pdf_text(line)));
    }
    content.push_str("ET");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_at = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    out.into_bytes()
}

fn escape_pdf_text(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .flat_map(|c| match c {
            '(' | ')' | '\\' => vec!['\\', c],
            c => vec![c],
        })
        .collect()
}
