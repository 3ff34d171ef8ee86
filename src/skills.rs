//! Skills: example code and instructions uploaded into the sandbox.
//!
//! Skills use progressive disclosure. Only the name and description from each
//! `SKILL.md` frontmatter go into the system prompt; the agent reads the full
//! file from the sandbox when a task matches.
//!
//! ```text
//! skills/
//! ├── web-research/
//! │   ├── SKILL.md        # Required: YAML frontmatter + instructions
//! │   └── helper.py       # Optional: supporting files
//! └── code-review/
//!     ├── SKILL.md
//!     └── checklist.md
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::agents::middleware::{append_section, AgentMiddleware};
use crate::agents::{AgentState, ModelRequest};
use crate::sandbox::FileUpload;

pub const SKILL_FILE_NAME: &str = "SKILL.md";

/// Metadata for a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub name: String,
    /// What the skill does
    pub description: String,
    /// Path to the SKILL.md file
    pub path: PathBuf,
}

impl SkillMetadata {
    /// Name of the directory holding the skill.
    pub fn dir_name(&self) -> String {
        self.path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Split YAML frontmatter off a markdown document.
///
/// The document must open with a `---` line and the frontmatter must be closed
/// by another `---` line. Returns the raw frontmatter text and the body.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let rest = rest.trim_start_matches([' ', '\t', '\r']);
    let rest = rest.strip_prefix('\n')?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" && line.ends_with('\n') {
            let frontmatter = rest[..offset].trim_end_matches(['\n', '\r']);
            let body = &rest[offset + line.len()..];
            return Some((frontmatter, body));
        }
        offset += line.len();
    }
    None
}

/// Parse `key: value` pairs from frontmatter.
///
/// Proper YAML mappings are read with `serde_yaml`; frontmatter that is not
/// valid YAML (unquoted colons in a description are common) falls back to a
/// line-by-line `key: value` scan.
fn parse_frontmatter_fields(frontmatter: &str) -> HashMap<String, String> {
    if let Ok(serde_yaml::Value::Mapping(mapping)) = serde_yaml::from_str(frontmatter) {
        return mapping
            .iter()
            .filter_map(|(k, v)| {
                let key = k.as_str()?.to_string();
                let value = match v {
                    serde_yaml::Value::String(s) => s.trim().to_string(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((key, value))
            })
            .collect();
    }

    frontmatter
        .lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once(':')?;
            let value = value.trim();
            let valid_key =
                !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
            if valid_key && !value.is_empty() {
                Some((key.to_string(), value.to_string()))
            } else {
                None
            }
        })
        .collect()
}

/// Parse the frontmatter of a `SKILL.md` file.
///
/// Returns `None` for files larger than `max_size`, without frontmatter, missing
/// `name` or `description`, unreadable, or not UTF-8.
pub fn parse_skill_metadata(skill_md_path: &Path, max_size: u64) -> Option<SkillMetadata> {
    let size = std::fs::metadata(skill_md_path).ok()?.len();
    if size > max_size {
        tracing::warn!(
            "Skipping {} ({} bytes exceeds limit of {})",
            skill_md_path.display(),
            size,
            max_size
        );
        return None;
    }

    let content = std::fs::read_to_string(skill_md_path).ok()?;
    let (frontmatter, _body) = split_frontmatter(&content)?;
    let mut fields = parse_frontmatter_fields(frontmatter);

    let name = fields.remove("name").filter(|s| !s.is_empty())?;
    let description = fields.remove("description").filter(|s| !s.is_empty())?;
    Some(SkillMetadata {
        name,
        description,
        path: skill_md_path.to_path_buf(),
    })
}

/// List skills from the immediate subdirectories of `skills_dir`.
///
/// A missing skills directory is not an error; it yields no skills.
pub fn list_skills(skills_dir: &Path, max_size: u64) -> anyhow::Result<Vec<SkillMetadata>> {
    if !skills_dir.is_dir() {
        tracing::warn!("Skills directory {} not found", skills_dir.display());
        return Ok(Vec::new());
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(skills_dir)
        .with_context(|| format!("Failed to read skills directory {}", skills_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let skills: Vec<SkillMetadata> = dirs
        .iter()
        .map(|dir| dir.join(SKILL_FILE_NAME))
        .filter(|p| p.is_file())
        .filter_map(|p| parse_skill_metadata(&p, max_size))
        .collect();

    tracing::debug!(
        "Loaded {} skills from {}",
        skills.len(),
        skills_dir.display()
    );
    Ok(skills)
}

/// Read every file under `skills_dir` for upload to `remote_base`.
///
/// Destinations use `/` separators regardless of the host platform. Files
/// are read eagerly, so every returned upload exists on disk at call time.
pub async fn collect_skill_uploads(
    skills_dir: &Path,
    remote_base: &str,
) -> anyhow::Result<Vec<FileUpload>> {
    let skills_dir = skills_dir.to_path_buf();
    let remote_base = remote_base.trim_end_matches('/').to_string();
    tokio::task::spawn_blocking(move || collect_skill_uploads_blocking(&skills_dir, &remote_base))
        .await
        .context("Skill collection task panicked")?
}

fn collect_skill_uploads_blocking(
    skills_dir: &Path,
    remote_base: &str,
) -> anyhow::Result<Vec<FileUpload>> {
    if skills_dir.exists() && !skills_dir.is_dir() {
        anyhow::bail!("Skills path {} is not a directory", skills_dir.display());
    }
    if !skills_dir.is_dir() {
        tracing::warn!(
            "Skills directory {} not found, nothing to upload",
            skills_dir.display()
        );
        return Ok(Vec::new());
    }

    let mut uploads = Vec::new();
    for entry in WalkDir::new(skills_dir).sort_by_file_name() {
        let entry = entry.context("Failed to walk skills directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(skills_dir)
            .context("Skill file outside skills directory")?;
        let rel_posix = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let content = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read skill file {}", entry.path().display()))?;
        uploads.push(FileUpload {
            destination: format!("{}/{}", remote_base, rel_posix),
            content,
        });
    }
    Ok(uploads)
}

/// Format skills for the system prompt.
pub fn format_skills_list(skills: &[SkillMetadata]) -> String {
    if skills.is_empty() {
        return "(No skills available yet. You can create skills in the skills dir)".to_string();
    }

    let mut lines = Vec::with_capacity(skills.len() * 2);
    for skill in skills {
        lines.push(format!("- **{}**: {}", skill.name, skill.description));
        lines.push(format!(
            "  → Read `{}/{}` for full instructions",
            skill.dir_name(),
            SKILL_FILE_NAME
        ));
    }
    lines.join("\n")
}

const SKILLS_SYSTEM_PROMPT: &str = r#"## Skills System

You have access to a skills library that provides specialized capabilities and domain knowledge.

**Skills Location**: `{skills_dir_absolute}`

**Available Skills:**

{skills_list}

**How to Use Skills (Progressive Disclosure):**

Skills follow a **progressive disclosure** pattern - you know they exist (name + description above), but you only read the full instructions when needed:

1. **Recognize when a skill applies**: Check if the user's task matches any skill's description
2. **Read the skill's full instructions**: The skill list above shows the exact path to use with read_file
3. **Follow the skill's instructions**: SKILL.md contains step-by-step workflows, best practices, and examples
4. **Access supporting files**: Skills may include Python scripts, configs, or reference docs - use absolute paths

**When to Use Skills:**
- When the user's request matches a skill's domain (e.g., "research X" → web-research skill)
- When you need specialized knowledge or structured workflows
- When a skill provides proven patterns for complex tasks

**Skills are Self-Documenting:**
- Each SKILL.md tells you exactly what the skill does and how to use it
- You can explore available skills with `ls {skills_dir_absolute}`
- You can read any skill's directory with `ls {skills_dir_absolute}/[skill-name]`

**Executing Skill Scripts:**
Skills may contain Python scripts or other executable files. Always use absolute paths:
Example: `bash python {skills_dir_absolute}/web-research/fetch_data.py`

**Example Workflow:**

User: "Can you research the latest developments in quantum computing?"

1. Check available skills above → See "web-research" skill with its full path
2. Read the skill using the path shown: `read_file '{skills_dir_absolute}/web-research/SKILL.md'`
3. Follow the skill's research workflow (search → organize → synthesize)
4. Use any helper scripts with absolute paths: `bash python {skills_dir_absolute}/web-research/script.py`

Remember: Skills are tools to make you more capable and consistent. When in doubt, check if a skill exists for the task!
"#;

/// Render the skills section of the system prompt.
pub fn skills_section(skills: &[SkillMetadata], sandbox_skills_path: &str) -> String {
    // Skill descriptions are inserted last so placeholders in them stay literal.
    SKILLS_SYSTEM_PROMPT
        .replace("{skills_dir_absolute}", sandbox_skills_path)
        .replace("{skills_list}", &format_skills_list(skills))
}

/// Loads skill metadata into state and lists skills in the system prompt.
pub struct SkillsMiddleware {
    skills_dir: PathBuf,
    max_file_size: u64,
    sandbox_skills_path: String,
}

impl SkillsMiddleware {
    pub fn new(skills_dir: PathBuf, max_file_size: u64, sandbox_skills_path: String) -> Self {
        Self {
            skills_dir,
            max_file_size,
            sandbox_skills_path,
        }
    }
}

#[async_trait]
impl AgentMiddleware for SkillsMiddleware {
    fn name(&self) -> &str {
        "skills"
    }

    /// Reloads on every interaction to pick up changes in the skills directory.
    async fn before_agent(&self, state: &mut AgentState) -> anyhow::Result<()> {
        let dir = self.skills_dir.clone();
        let max = self.max_file_size;
        let skills = tokio::task::spawn_blocking(move || list_skills(&dir, max))
            .await
            .context("Skill loading task panicked")??;
        tracing::info!("Loaded {} skills", skills.len());
        state.skills_metadata = Some(skills);
        Ok(())
    }

    fn wrap_model_request(&self, state: &AgentState, request: ModelRequest) -> ModelRequest {
        let skills = state.skills_metadata.as_deref().unwrap_or(&[]);
        let section = skills_section(skills, &self.sandbox_skills_path);
        let prompt = append_section(request.system_prompt.as_deref(), &section);
        request.with_system_prompt(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_skill(root: &Path, dir: &str, content: &str) -> PathBuf {
        let skill_dir = root.join(dir);
        std::fs::create_dir_all(&skill_dir).unwrap();
        let path = skill_dir.join(SKILL_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn split_frontmatter_requires_delimiters() {
        let (fm, body) = split_frontmatter("---\nname: a\n---\nbody\n").unwrap();
        assert_eq!(fm, "name: a");
        assert_eq!(body, "body\n");

        assert!(split_frontmatter("name: a\n---\n").is_none());
        assert!(split_frontmatter("---\nname: a\n").is_none());
        // Closing delimiter must end with a newline.
        assert!(split_frontmatter("---\nname: a\n---").is_none());
    }

    #[test]
    fn parses_name_and_description() {
        let tmp = TempDir::new().unwrap();
        let path = write_skill(
            tmp.path(),
            "web-research",
            "---\nname: web-research\ndescription: Research topics on the web\n---\n# Steps\n",
        );
        let meta = parse_skill_metadata(&path, 1024).unwrap();
        assert_eq!(meta.name, "web-research");
        assert_eq!(meta.description, "Research topics on the web");
        assert_eq!(meta.dir_name(), "web-research");
    }

    #[test]
    fn falls_back_to_line_parsing_for_invalid_yaml() {
        let tmp = TempDir::new().unwrap();
        let path = write_skill(
            tmp.path(),
            "review",
            "---\nname: review\ndescription: Review code: style, bugs\n---\n",
        );
        let meta = parse_skill_metadata(&path, 1024).unwrap();
        assert_eq!(meta.description, "Review code: style, bugs");
    }

    #[test]
    fn rejects_incomplete_or_oversized_skills() {
        let tmp = TempDir::new().unwrap();
        let no_desc = write_skill(tmp.path(), "a", "---\nname: a\n---\n");
        assert!(parse_skill_metadata(&no_desc, 1024).is_none());

        let no_frontmatter = write_skill(tmp.path(), "b", "# Just a heading\n");
        assert!(parse_skill_metadata(&no_frontmatter, 1024).is_none());

        let big = write_skill(
            tmp.path(),
            "c",
            "---\nname: c\ndescription: big\n---\nxxxxxxxxxxxxxxxxxxxx\n",
        );
        assert!(parse_skill_metadata(&big, 10).is_none());
    }

    #[test]
    fn list_skills_skips_dirs_without_skill_md() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "b-skill", "---\nname: b\ndescription: second\n---\n");
        write_skill(tmp.path(), "a-skill", "---\nname: a\ndescription: first\n---\n");
        std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
        std::fs::write(tmp.path().join("README.md"), "not a skill").unwrap();

        let skills = list_skills(tmp.path(), 1024).unwrap();
        let names: Vec<_> = skills.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn list_skills_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let skills = list_skills(&tmp.path().join("nope"), 1024).unwrap();
        assert!(skills.is_empty());
    }

    #[test]
    fn collect_uploads_walks_recursively() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "web", "---\nname: web\ndescription: d\n---\n");
        std::fs::create_dir_all(tmp.path().join("web/scripts")).unwrap();
        std::fs::write(tmp.path().join("web/scripts/fetch.py"), "print(1)").unwrap();

        let uploads = tokio_test::block_on(collect_skill_uploads(
            tmp.path(),
            "/home/daytona/skills/",
        ))
        .unwrap();
        let dests: Vec<_> = uploads.iter().map(|u| u.destination.as_str()).collect();
        assert_eq!(
            dests,
            vec![
                "/home/daytona/skills/web/SKILL.md",
                "/home/daytona/skills/web/scripts/fetch.py",
            ]
        );
        assert_eq!(uploads[1].content, b"print(1)");
    }

    #[test]
    fn collect_uploads_rejects_file_as_dir() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("skills");
        std::fs::write(&file, "not a dir").unwrap();
        assert!(tokio_test::block_on(collect_skill_uploads(&file, "/s")).is_err());
        assert!(tokio_test::block_on(collect_skill_uploads(&tmp.path().join("nope"), "/s"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn format_lists_each_skill_with_its_path() {
        let skills = vec![SkillMetadata {
            name: "web-research".to_string(),
            description: "Research".to_string(),
            path: PathBuf::from("/x/skills/web/SKILL.md"),
        }];
        let out = format_skills_list(&skills);
        assert_eq!(
            out,
            "- **web-research**: Research\n  → Read `web/SKILL.md` for full instructions"
        );
        assert!(format_skills_list(&[]).starts_with("(No skills available yet."));
    }

    #[test]
    fn section_leaves_placeholders_in_descriptions_alone() {
        let skills = vec![SkillMetadata {
            name: "templating".to_string(),
            description: "Expands {skills_dir_absolute} in templates".to_string(),
            path: PathBuf::from("/x/skills/templating/SKILL.md"),
        }];
        let section = skills_section(&skills, "/home/user/skills");
        assert!(section.contains("- **templating**: Expands {skills_dir_absolute} in templates"));
        assert!(section.contains("**Skills Location**: `/home/user/skills`"));
    }

    #[tokio::test]
    async fn middleware_appends_skills_section() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "web", "---\nname: web\ndescription: Search\n---\n");
        let mw = SkillsMiddleware::new(
            tmp.path().to_path_buf(),
            1024,
            "/home/daytona/skills".to_string(),
        );

        let mut state = AgentState::new();
        mw.before_agent(&mut state).await.unwrap();
        assert_eq!(state.skills_metadata.as_ref().unwrap().len(), 1);

        let out = mw.wrap_model_request(&state, ModelRequest::new("BASE"));
        let prompt = out.system_prompt.unwrap();
        assert!(prompt.starts_with("BASE\n\n## Skills System"));
        assert!(prompt.contains("**Skills Location**: `/home/daytona/skills`"));
        assert!(prompt.contains("- **web**: Search"));
        assert!(!prompt.contains("{skills_dir_absolute}"));
    }
}
