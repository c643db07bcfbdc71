use chatgpt_export_md::sequential::{self, Summary};
use chatgpt_export_md::utils::ExportConfig;
use indicatif::ProgressBar;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

struct Fixture {
    input: TempDir,
    output: TempDir,
}

impl Fixture {
    fn new(archive: Value) -> Self {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(
            input.path().join("conversations.json"),
            serde_json::to_vec(&archive).unwrap(),
        )
        .unwrap();
        Self { input, output }
    }

    fn config(&self) -> ExportConfig {
        ExportConfig {
            input_dir: self.input.path().to_path_buf(),
            target_dir: self.output.path().to_path_buf(),
            message_separator: "\n---\n".to_string(),
            include_timestamps: false,
            prefix_date_in_filename: false,
            front_matter: false,
            quiet: true,
            ..ExportConfig::default()
        }
    }

    fn run(&self, config: &ExportConfig) -> Summary {
        sequential::execute(config, &ProgressBar::hidden()).unwrap()
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.output.path().join(name)).unwrap()
    }

    fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.output.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn msg(role: &str, time: f64, text: &str) -> Value {
    json!({
        "message": {
            "author": {"role": role},
            "create_time": time,
            "content": {"content_type": "text", "parts": [text]}
        }
    })
}

#[test]
fn two_message_conversation() {
    let fx = Fixture::new(json!([{
        "title": "Test",
        "mapping": {
            "root": {"message": null},
            "reply": msg("assistant", 2.0, "Hi there"),
            "ask": msg("user", 1.0, "Hello")
        }
    }]));

    let summary = fx.run(&fx.config());

    assert_eq!(
        summary,
        Summary {
            written: 1,
            skipped: 0,
            errors: 0
        }
    );
    assert_eq!(fx.files(), ["Test.md"]);
    assert_eq!(
        fx.read("Test.md"),
        "**Me**:\n\n```\nHello\n\n```\n---\n**ChatGPT**:\n\nHi there\n\n---\n"
    );
}

#[test]
fn long_reply_is_collapsed_in_the_file() {
    let fx = Fixture::new(json!([{
        "title": "Long",
        "mapping": {
            "ask": msg("user", 1.0, "Count to six"),
            "reply": msg("assistant", 2.0, "1\n2\n3\n4\n5\n6")
        }
    }]));

    fx.run(&fx.config());

    assert_eq!(
        fx.read("Long.md"),
        "**Me**:\n\n```\nCount to six\n\n```\n---\n\
         **ChatGPT**:\n\n<details><summary>Long Message with 6 lines</summary>\n\n\
         1\n2\n3\n4\n5\n6\n\n\n</details>\n---\n\n\n"
    );
}

#[test]
fn malformed_entries_are_skipped() {
    let fx = Fixture::new(json!([
        "not a conversation",
        42,
        {"title": "Empty", "mapping": {"root": {"message": null}}},
        {"title": "No mapping"},
        {
            "title": "Survivor",
            "mapping": {
                "a": msg("user", 1.0, "first"),
                "b": {"message": {"author": {"role": "assistant"}, "create_time": 2.0, "content": {}}},
                "c": msg("assistant", 3.0, "third")
            }
        }
    ]));

    let summary = fx.run(&fx.config());

    assert_eq!(summary.written, 1);
    assert_eq!(summary.skipped, 4);
    assert_eq!(summary.errors, 0);
    assert_eq!(fx.files(), ["Survivor.md"]);
    let text = fx.read("Survivor.md");
    assert!(text.contains("first"));
    assert!(text.contains("third"));
}

#[test]
fn messages_follow_create_time() {
    let fx = Fixture::new(json!([{
        "title": "Order",
        "mapping": {
            "c": msg("assistant", 30.0, "gamma"),
            "a": msg("assistant", 10.0, "alpha"),
            "u": {"message": {"author": {"role": "system"}, "content": {"parts": ["untimed"]}}},
            "b": msg("assistant", 20.0, "beta")
        }
    }]));

    fx.run(&fx.config());

    let text = fx.read("Order.md");
    let pos = |needle: &str| text.find(needle).unwrap();
    assert!(pos("untimed") < pos("alpha"));
    assert!(pos("alpha") < pos("beta"));
    assert!(pos("beta") < pos("gamma"));
}

#[test]
fn images_are_copied_next_to_the_markdown() {
    let fx = Fixture::new(json!([{
        "title": "Pictures",
        "mapping": {
            "a": {"message": {
                "author": {"role": "user"},
                "create_time": 1.0,
                "content": {"content_type": "multimodal_text", "parts": [
                    {"content_type": "image_asset_pointer", "asset_pointer": "file-service://file-MISSING"},
                    {"content_type": "image_asset_pointer", "asset_pointer": "file-service://file-ABC123"},
                    "What is in this picture?"
                ]}
            }},
            "b": {"message": {
                "author": {"role": "tool", "name": "dalle.text2im"},
                "create_time": 2.0,
                "content": {"content_type": "multimodal_text", "parts": [
                    {
                        "content_type": "image_asset_pointer",
                        "asset_pointer": "sediment://file_0a1b",
                        "metadata": {"dalle": {"prompt": "the same, but blue"}}
                    }
                ]}
            }}
        }
    }]));
    let png = b"\x89PNG\r\n\x1a\nrest-of-image";
    fs::write(fx.input.path().join("file-ABC123.png"), png).unwrap();
    let dalle_dir = fx.input.path().join("dalle-generations");
    fs::create_dir(&dalle_dir).unwrap();
    fs::write(dalle_dir.join("file_0a1b-generated.webp"), b"webp").unwrap();

    fx.run(&fx.config());

    assert_eq!(
        fx.files(),
        ["Pictures.md", "Pictures_image_1.png", "Pictures_image_2.webp"]
    );
    assert_eq!(
        fs::read(fx.output.path().join("Pictures_image_1.png")).unwrap(),
        png
    );

    let text = fx.read("Pictures.md");
    assert!(text.contains("<img src=\"Pictures_image_1.png\""));
    assert!(text.contains("**ChatGPT (DALL·E)**: *the same, but blue*"));
    assert!(text.contains("<img src=\"Pictures_image_2.webp\""));
    assert!(!text.contains("MISSING"));
}

#[test]
fn front_matter_and_date_prefix() {
    let fx = Fixture::new(json!([{
        "title": null,
        "mapping": {
            "a": msg("user", 1_700_000_000.0, "Plan my week\nwith details")
        }
    }]));
    let config = ExportConfig {
        prefix_date_in_filename: true,
        front_matter: true,
        ..fx.config()
    };

    fx.run(&config);

    let date = chatgpt_export_md::utils::format_timestamp(1_700_000_000.0, "%Y-%m-%d").unwrap();
    let name = format!("{}_Plan_my_week.md", date);
    assert_eq!(fx.files(), [name.clone()]);
    let text = fx.read(&name);
    assert!(text.starts_with("---\ntitle: Plan my week...\ndate:"));
    assert!(text.contains("```\nPlan my week\nwith details\n\n```"));
}

#[test]
fn duplicate_titles_do_not_overwrite() {
    let fx = Fixture::new(json!([
        {"title": "Same", "mapping": {"a": msg("user", 1.0, "one")}},
        {"title": "Same", "mapping": {"a": msg("user", 1.0, "two")}}
    ]));

    fx.run(&fx.config());

    assert_eq!(fx.files(), ["Same.md", "Same_2.md"]);
    assert!(fx.read("Same.md").contains("one"));
    assert!(fx.read("Same_2.md").contains("two"));
}

#[test]
fn unreadable_archive_is_fatal() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let config = ExportConfig {
        input_dir: input.path().to_path_buf(),
        target_dir: output.path().join("nested"),
        quiet: true,
        ..ExportConfig::default()
    };
    assert!(sequential::execute(&config, &ProgressBar::hidden()).is_err());

    fs::write(input.path().join("conversations.json"), b"{\"not\": \"a list\"}").unwrap();
    assert!(sequential::execute(&config, &ProgressBar::hidden()).is_err());
    assert!(Path::new(&config.target_dir).is_dir());
}
