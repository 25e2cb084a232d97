//! HTML index generation.
//!
//! Stage 4 of the build. Renders the aggregated index as a single static page
//! whose images are served straight from the bucket.
//!
//! ## Output
//!
//! ```text
//! docs/
//! └── index.html     # paths.output
//! ```
//!
//! Each entry becomes a figure: the thumbnail (`storage_root + thumbnail_url`)
//! links to the original (`storage_root + full_url`), captioned with the
//! capture date and whatever camera facts the record carries. Entries appear
//! in index order, newest first.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Templates are type-safe Rust code with automatic XSS escaping, so field
//! values taken from photo metadata cannot inject markup.

use crate::config::{PipelineConfig, SiteConfig};
use crate::index::GalleryIndexEntry;
use crate::store::MetadataRecord;
use maud::{DOCTYPE, Markup, html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

const CSS: &str = r#"
:root { --bg: #111; --fg: #ddd; --muted: #888; --gap: 1rem; }
* { box-sizing: border-box; }
body { margin: 0; background: var(--bg); color: var(--fg); font: 15px/1.4 system-ui, sans-serif; }
header.site-header { padding: 1.5rem var(--gap); }
header.site-header h1 { margin: 0; font-weight: 400; letter-spacing: 0.05em; }
header.site-header p { margin: 0.25rem 0 0; color: var(--muted); }
main.gallery { display: grid; grid-template-columns: repeat(auto-fill, minmax(320px, 1fr)); gap: var(--gap); padding: 0 var(--gap) var(--gap); }
figure.photo { margin: 0; }
figure.photo img { display: block; width: 100%; height: auto; }
figure.photo figcaption { padding: 0.4rem 0; color: var(--muted); font-size: 0.85rem; }
figure.photo time { color: var(--fg); }
p.empty { padding: var(--gap); color: var(--muted); }
"#;

/// Render the index and write it to `config.paths.output`.
///
/// Parent directories are created as needed; an existing file is replaced.
pub fn generate(
    entries: &[GalleryIndexEntry],
    config: &PipelineConfig,
) -> Result<PathBuf, RenderError> {
    let output = &config.paths.output;
    let page = render_index(entries, &config.storage_root(), &config.site);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    fs::write(output, page.into_string()).map_err(|source| io_error(output, source))?;
    tracing::info!(path = %output.display(), entries = entries.len(), "index written");
    Ok(output.clone())
}

fn io_error(path: &Path, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (CSS) }
            }
            body {
                (content)
            }
        }
    }
}

/// Renders the full index page.
pub fn render_index(entries: &[GalleryIndexEntry], storage_root: &str, site: &SiteConfig) -> Markup {
    let content = html! {
        header.site-header {
            h1 { (site.title) }
            p { (photo_count(entries.len())) }
        }
        @if entries.is_empty() {
            p.empty { "No photos yet." }
        } @else {
            main.gallery {
                @for entry in entries {
                    (render_entry(entry, storage_root))
                }
            }
        }
    };

    base_document(&site.title, content)
}

fn render_entry(entry: &GalleryIndexEntry, storage_root: &str) -> Markup {
    let record = &entry.record;
    let full = record.full_url().map(|u| format!("{storage_root}{u}"));
    let thumb = record.thumbnail_url().map(|u| format!("{storage_root}{u}"));
    let facts = camera_facts(record);

    html! {
        figure.photo id=(entry.id.to_string()) {
            a href=[full] {
                img src=[thumb] alt=(entry.id.name) loading="lazy";
            }
            figcaption {
                time datetime=(entry.taken.format("%Y-%m-%dT%H:%M:%S").to_string()) {
                    (entry.taken.format("%Y-%m-%d %H:%M").to_string())
                }
                @if !facts.is_empty() {
                    " · " (facts)
                }
            }
        }
    }
}

fn photo_count(n: usize) -> String {
    match n {
        1 => "1 photo".to_string(),
        n => format!("{n} photos"),
    }
}

/// One-line summary of camera settings, skipping fields the record lacks.
///
/// ```text
/// FUJIFILM X100V · 23mm · f/2.0 · 1/250 · ISO 160
/// ```
pub fn camera_facts(record: &MetadataRecord) -> String {
    let camera = [record.get("make"), record.get("model")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    let mut parts = Vec::new();
    if !camera.is_empty() {
        parts.push(camera);
    }
    if let Some(lens) = record.get("lens") {
        parts.push(lens.to_string());
    }
    if let Some(focal) = record.get("focal_length") {
        parts.push(focal.to_string());
    }
    if let Some(f) = record.get("f") {
        parts.push(format!("f/{f}"));
    }
    if let Some(exposure) = record.get("exposure").or(record.get("shutter")) {
        parts.push(exposure.to_string());
    }
    if let Some(iso) = record.get("iso") {
        parts.push(format!("ISO {iso}"));
    }
    parts.join(" · ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::parse_timestamp;
    use crate::types::RecordId;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn entry(collection: &str, name: &str, taken: &str, extra: &[(&str, &str)]) -> GalleryIndexEntry {
        let mut fields: BTreeMap<String, String> = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        fields.insert("datetime".into(), taken.into());
        GalleryIndexEntry {
            id: RecordId::new(collection, name),
            taken: parse_timestamp(taken).unwrap(),
            record: MetadataRecord::new(
                fields,
                format!("thumbnails/{collection}/{name}"),
                format!("photos/{collection}/{name}"),
            ),
        }
    }

    const ROOT: &str = "https://storage.googleapis.com/b/";

    #[test]
    fn entry_links_full_around_thumbnail() {
        let entries = vec![entry("2023-05-01", "IMG2.jpg", "2023:05:01 18:22:05", &[])];
        let html = render_index(&entries, ROOT, &SiteConfig::default()).into_string();

        assert!(html.contains(r#"href="https://storage.googleapis.com/b/photos/2023-05-01/IMG2.jpg""#));
        assert!(html.contains(r#"src="https://storage.googleapis.com/b/thumbnails/2023-05-01/IMG2.jpg""#));
        assert!(html.contains("2023-05-01 18:22"));
    }

    #[test]
    fn entries_render_in_given_order() {
        let entries = vec![
            entry("d", "newer.jpg", "2023:06:15 09:00:00", &[]),
            entry("d", "older.jpg", "2023:01:01 09:00:00", &[]),
        ];
        let html = render_index(&entries, ROOT, &SiteConfig::default()).into_string();

        let newer = html.find("newer.jpg").unwrap();
        let older = html.find("older.jpg").unwrap();
        assert!(newer < older);
    }

    #[test]
    fn page_uses_site_title_and_count() {
        let site = SiteConfig {
            title: "Holiday".into(),
        };
        let entries = vec![entry("d", "a.jpg", "2023:06:15 09:00:00", &[])];
        let html = render_index(&entries, ROOT, &site).into_string();

        assert!(html.contains("<title>Holiday</title>"));
        assert!(html.contains("1 photo"));
    }

    #[test]
    fn empty_index_renders_placeholder() {
        let html = render_index(&[], ROOT, &SiteConfig::default()).into_string();
        assert!(html.contains("No photos yet."));
        assert!(html.contains("0 photos"));
    }

    #[test]
    fn metadata_values_are_escaped() {
        let entries = vec![entry(
            "d",
            "a.jpg",
            "2023:06:15 09:00:00",
            &[("model", "<script>alert(1)</script>")],
        )];
        let html = render_index(&entries, ROOT, &SiteConfig::default()).into_string();

        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn camera_facts_skip_missing_fields() {
        let e = entry(
            "d",
            "a.jpg",
            "2023:06:15 09:00:00",
            &[
                ("make", "FUJIFILM"),
                ("model", "X100V"),
                ("f", "2.0"),
                ("iso", "160"),
            ],
        );
        assert_eq!(camera_facts(&e.record), "FUJIFILM X100V · f/2.0 · ISO 160");

        let bare = entry("d", "b.jpg", "2023:06:15 09:00:00", &[]);
        assert_eq!(camera_facts(&bare.record), "");
    }

    #[test]
    fn generate_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.paths.output = tmp.path().join("docs/site/index.html");
        let entries = vec![entry("d", "a.jpg", "2023:06:15 09:00:00", &[])];

        let written = generate(&entries, &config).unwrap();

        assert_eq!(written, config.paths.output);
        let html = std::fs::read_to_string(&written).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("photos/d/a.jpg"));
    }

    #[test]
    fn generate_reports_unwritable_output() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("docs"), "file, not a directory").unwrap();
        let mut config = PipelineConfig::default();
        config.paths.output = tmp.path().join("docs/index.html");

        assert!(matches!(
            generate(&[], &config),
            Err(RenderError::Io { .. })
        ));
    }
}
