use crate::assets::AssetResolver;
use crate::importer::{ArchiveError, ContentPart, ImagePointer, Message, Role};
use crate::utils::{ExportConfig, format_timestamp};
use regex::{Captures, Regex};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::LazyLock;

static INLINE_MATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\\\((.+?)\\\)").unwrap());
static DISPLAY_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\[(.+?)\\\]").unwrap());
static BACKTICK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`+").unwrap());

const MIN_FENCE: usize = 3;

#[derive(Serialize)]
struct Frontmatter<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

/// YAML block written at the top of a file when front matter is enabled.
pub fn render_front_matter(title: &str, date: Option<String>) -> serde_yaml::Result<String> {
    let yaml = serde_yaml::to_string(&Frontmatter { title, date })?;
    Ok(format!("---\n{}---\n\n", yaml))
}

/// Rewrite `\( … \)` to `$ … $` and `\[ … \]` to `$$ … $$`. Unmatched delimiters are kept.
pub fn convert_latex(text: &str) -> Cow<'_, str> {
    let inline = INLINE_MATH.replace_all(text, |caps: &Captures| format!("${}$", &caps[1]));
    if !DISPLAY_MATH.is_match(&inline) {
        return inline;
    }
    let display = DISPLAY_MATH.replace_all(&inline, |caps: &Captures| format!("$${}$$", &caps[1]));
    Cow::Owned(display.into_owned())
}

/// A backtick fence one longer than the longest backtick run in `content`, at least three.
pub fn fence_for(content: &str) -> String {
    let longest = BACKTICK_RUN
        .find_iter(content)
        .map(|m| m.as_str().len())
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(MIN_FENCE))
}

fn author_label<'a>(config: &'a ExportConfig, role: Role) -> &'a str {
    match role {
        Role::User => &config.user_name,
        _ => &config.assistant_name,
    }
}

fn render_image(out: &mut String, file_name: &str, image: &ImagePointer, author: &str) {
    if let Some(prompt) = &image.prompt {
        let _ = writeln!(out, "**{} (DALL·E)**: *{}*", author, prompt);
    }
    let _ = write!(
        out,
        "\n<img src=\"{}\" alt=\"Generated image\" width=\"400\">\n\n",
        file_name
    );
}

/// Wrap, convert and optionally collapse the accumulated text of one message.
pub fn render_body(content: &str, role: Role, config: &ExportConfig) -> String {
    render_body_inner(content, role, config).0
}

// Also reports whether the body ended up inside a `<details>` block.
fn render_body_inner(content: &str, role: Role, config: &ExportConfig) -> (String, bool) {
    let use_code_block = role == Role::User || content.contains("```");
    let content = if config.convert_latex {
        convert_latex(content)
    } else {
        Cow::Borrowed(content)
    };

    let num_lines = content.lines().count();
    let collapse =
        config.collapse_long_messages && num_lines > config.long_message_line_threshold;

    let mut out = String::new();
    if collapse {
        let open_attr = if config.collapse_open_by_default { " open" } else { "" };
        let _ = write!(
            out,
            "<details{}><summary>Long Message with {} lines</summary>\n\n",
            open_attr, num_lines
        );
    }

    if use_code_block {
        let fence = fence_for(&content);
        let _ = write!(out, "{}\n{}\n{}", fence, content, fence);
    } else {
        out.push_str(&content);
    }

    if collapse {
        out.push_str("\n\n</details>");
    }
    (out, collapse)
}

/// Render one message to the exact text appended to its conversation file.
///
/// Images are copied as they are met, in part order, and are emitted even when the
/// message's text is empty and `skip_empty_messages` suppresses the text. A message
/// producing neither text nor images renders to an empty string.
pub fn render_message(
    message: &Message,
    config: &ExportConfig,
    assets: &mut AssetResolver<'_>,
) -> Result<String, ArchiveError> {
    let parts = message.content_parts()?;
    let role = message.author.role();
    let author = author_label(config, role);

    let mut content = String::new();
    let mut images = String::new();
    for part in &parts {
        match part {
            ContentPart::Image(image) => match assets.resolve(image, &message.author) {
                Ok(file_name) => render_image(&mut images, &file_name, image, author),
                Err(e) => tracing::warn!("{}", e),
            },
            other => {
                content.push_str(other.text().unwrap_or_default());
                content.push('\n');
            }
        }
    }

    let skip_text = config.skip_empty_messages && content.is_empty();
    if skip_text && images.is_empty() {
        return Ok(String::new());
    }

    let mut out = String::new();
    if config.include_timestamps
        && let Some(ts) = message.create_time()
        && let Some(time) = format_timestamp(ts, &config.time_format)
    {
        let _ = writeln!(out, "<sub>{}</sub>", time);
    }
    let _ = write!(out, "**{}**:\n\n", author);
    out.push_str(&images);

    let collapsed = if skip_text {
        false
    } else {
        let (body, collapsed) = render_body_inner(&content, role, config);
        out.push_str(&body);
        collapsed
    };

    out.push_str(&config.message_separator);
    if collapsed {
        out.push_str("\n\n");
    }
    Ok(out)
}
