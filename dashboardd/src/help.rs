use std::fs;
use std::path::{Path, PathBuf};

use pulldown_cmark::{html, Event, Options, Parser};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One `*.yaml` descriptor in the help content directory. The id is derived
/// from the file stem, not stored in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpTopic {
    #[serde(skip_deserializing)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub sections: Vec<HelpSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpSection {
    pub heading: String,
    /// Markdown source, rendered to HTML at serve time
    pub content: String,
}

/// A topic with every section's Markdown rendered to HTML.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedTopic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub color: String,
    pub thumbnail_url: Option<String>,
    pub sections: Vec<RenderedSection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedSection {
    pub heading: String,
    pub html: String,
}

fn default_color() -> String {
    "primary".to_string()
}

/// Loads help topics from a directory of YAML descriptors. Nothing is
/// cached; content is read fresh on every request.
pub struct HelpCenter {
    content_dir: PathBuf,
}

impl HelpCenter {
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
        }
    }

    /// All topics, in directory enumeration order. Descriptors that fail to
    /// parse are skipped with a warning rather than hiding the whole list.
    pub fn topics(&self) -> Result<Vec<HelpTopic>> {
        let mut topics = Vec::new();
        for entry in fs::read_dir(&self.content_dir)? {
            let path = entry?.path();
            if !is_descriptor(&path) {
                continue;
            }
            match load_topic(&path) {
                Ok(topic) => topics.push(topic),
                Err(e) => tracing::warn!("skipping help descriptor {}: {e}", path.display()),
            }
        }
        Ok(topics)
    }

    /// Load one topic by id and render its sections.
    pub fn topic(&self, id: &str) -> Result<RenderedTopic> {
        if id.contains(['/', '\\']) || id.contains("..") {
            return Err(Error::TopicNotFound(id.to_string()));
        }
        for ext in ["yaml", "yml"] {
            let path = self.content_dir.join(format!("{id}.{ext}"));
            if path.exists() {
                let topic = load_topic(&path)?;
                return Ok(render_topic(topic));
            }
        }
        Err(Error::TopicNotFound(id.to_string()))
    }
}

fn is_descriptor(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        )
}

fn load_topic(path: &Path) -> Result<HelpTopic> {
    let raw = fs::read_to_string(path)?;
    let mut topic: HelpTopic = serde_yaml::from_str(&raw)?;
    topic.id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();
    Ok(topic)
}

fn render_topic(topic: HelpTopic) -> RenderedTopic {
    RenderedTopic {
        id: topic.id,
        title: topic.title,
        description: topic.description,
        color: topic.color,
        thumbnail_url: topic.thumbnail_url,
        sections: topic
            .sections
            .into_iter()
            .map(|section| RenderedSection {
                heading: section.heading,
                html: render_markdown(&section.content),
            })
            .collect(),
    }
}

/// Markdown to HTML with tables enabled and soft line breaks promoted to
/// hard breaks; fenced code blocks are part of the base grammar.
pub fn render_markdown(source: &str) -> String {
    let parser = Parser::new_ext(source, Options::ENABLE_TABLES).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}
