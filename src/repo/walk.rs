use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use walkdir::WalkDir;

use crate::chunking::detect_language;
use crate::config::ContentLimits;
use crate::models::{AnalysisRequest, Repo};

/// Extensions whose files are excerpted into analysis prompts.
const EXCERPT_EXTENSIONS: &[&str] = &[
    "go", "py", "js", "ts", "tsx", "jsx", "java", "rs", "rb", "swift", "kt", "c", "cpp", "h",
    "cs", "php", "sh", "yaml", "yml", "toml", "json", "sql", "proto", "tf", "md",
];

/// Extension-less or well-known files that are always worth excerpting.
const EXCERPT_FILES: &[&str] = &[
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "Makefile",
    "go.mod",
    "package.json",
    "requirements.txt",
    "README.md",
    ".gitignore",
];

/// Never indexed: binary, media, archives and lockfiles.
const SKIP_INDEX_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "tiff",
    // audio / video
    "mp4", "avi", "mov", "mp3", "wav", "flac", "ogg", "webm",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // archives
    "zip", "tar", "gz", "bz2", "7z", "rar", "jar", "war",
    // compiled
    "exe", "dll", "so", "dylib", "o", "a", "class", "pyc", "wasm",
    "lock",
    // documents and data
    "sqlite", "db", "pdf", "doc", "docx", "xls", "xlsx", "ppt",
    "map",
];

const SKIP_INDEX_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "go.sum",
    "Cargo.lock",
    "Gemfile.lock",
    "composer.lock",
    "poetry.lock",
    "Pipfile.lock",
];

/// A file found while walking a checkout
struct WalkedFile {
    relative_path: String,
    file_name: String,
    extension: String,
    size: u64,
    path: std::path::PathBuf,
}

/// Walk `root` in a stable order, skipping hidden and dependency directories.
fn walk_files(root: &Path) -> Vec<WalkedFile> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let size = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);

        files.push(WalkedFile {
            relative_path,
            file_name: entry.file_name().to_string_lossy().to_string(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            size,
            path: path.to_path_buf(),
        });
    }

    files
}

fn is_ignored_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || matches!(
            name.as_ref(),
            "node_modules" | "vendor" | "__pycache__" | "dist" | "build" | "target"
        )
}

fn is_excerpt_candidate(file: &WalkedFile) -> bool {
    EXCERPT_EXTENSIONS.contains(&file.extension.as_str())
        || EXCERPT_FILES.contains(&file.file_name.as_str())
}

fn is_index_candidate(file: &WalkedFile, max_bytes: u64) -> bool {
    !SKIP_INDEX_FILES.contains(&file.file_name.as_str())
        && !SKIP_INDEX_EXTENSIONS.contains(&file.extension.as_str())
        && file.size <= max_bytes
}

/// Build the analysis request for a checkout: the full file tree plus bounded excerpts.
pub fn build_analysis_request(root: &Path, repo: &Repo, limits: &ContentLimits) -> AnalysisRequest {
    let mut file_tree = Vec::new();
    let mut excerpts = Vec::new();
    let mut total_chars = 0usize;
    let mut languages: HashMap<&'static str, usize> = HashMap::new();

    for file in walk_files(root) {
        file_tree.push(file.relative_path.clone());

        if !is_excerpt_candidate(&file)
            || file.size > limits.max_excerpt_file_bytes
            || excerpts.len() >= limits.max_excerpts
            || total_chars >= limits.max_excerpt_total_chars
        {
            continue;
        }

        let Ok(content) = std::fs::read_to_string(&file.path) else {
            continue;
        };
        let excerpt = format!("=== {} ===\n{}", file.relative_path, content);
        total_chars += excerpt.len();
        excerpts.push(excerpt);

        let lang = detect_language(&file.relative_path);
        if lang != "unknown" {
            *languages.entry(lang).or_insert(0) += 1;
        }
    }

    tracing::info!(
        repo = %repo.name,
        files = file_tree.len(),
        excerpts = excerpts.len(),
        chars = total_chars,
        "Analysis request built"
    );

    AnalysisRequest {
        repo_id: repo.id,
        repo_name: repo.name.clone(),
        file_tree,
        excerpts,
        commit_hash: head_commit(root),
        language: primary_language(&languages),
    }
}

/// Every indexable file of a checkout, keyed by relative path.
pub fn collect_index_files(root: &Path, limits: &ContentLimits) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();

    for file in walk_files(root) {
        if !is_index_candidate(&file, limits.max_index_file_bytes) {
            continue;
        }
        match std::fs::read_to_string(&file.path) {
            Ok(content) => {
                files.insert(file.relative_path, content);
            }
            Err(e) => {
                tracing::debug!(path = %file.relative_path, error = %e, "Skipping unreadable file");
            }
        }
    }

    files
}

/// HEAD commit id, when the checkout is a git repository.
pub fn head_commit(root: &Path) -> Option<String> {
    let repo = git2::Repository::open(root).ok()?;
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

/// Most frequent language; ties go to the alphabetically first name.
fn primary_language(counts: &HashMap<&'static str, usize>) -> Option<String> {
    counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(lang, _)| lang.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use uuid::Uuid;

    fn repo(root: &Path) -> Repo {
        Repo {
            id: Uuid::new_v4(),
            name: "demo".to_string(),
            local_path: root.to_string_lossy().to_string(),
            report_language: None,
            added_at: Utc::now(),
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_tree_skips_hidden_and_dependency_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "node_modules/x/index.js", "x");
        write(dir.path(), "target/debug/out.rs", "x");
        write(dir.path(), ".github/workflows/ci.yml", "x");
        write(dir.path(), ".gitignore", "target/");

        let req = build_analysis_request(dir.path(), &repo(dir.path()), &ContentLimits::default());
        assert_eq!(req.file_tree, vec![".gitignore".to_string(), "src/main.rs".to_string()]);
        assert_eq!(req.excerpts.len(), 2);
        assert!(req.excerpts[1].starts_with("=== src/main.rs ===\nfn main()"));
        assert_eq!(req.language.as_deref(), Some("rust"));
        assert!(req.commit_hash.is_none());
    }

    #[test]
    fn test_excerpt_limits() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write(dir.path(), &format!("f{i}.py"), &"x".repeat(100));
        }
        write(dir.path(), "big.py", &"y".repeat(200));
        write(dir.path(), "image.png", "not really");

        let limits = ContentLimits {
            max_excerpts: 3,
            max_excerpt_file_bytes: 150,
            ..ContentLimits::default()
        };
        let req = build_analysis_request(dir.path(), &repo(dir.path()), &limits);
        assert_eq!(req.file_tree.len(), 7);
        assert_eq!(req.excerpts.len(), 3);
        assert!(req.excerpts.iter().all(|e| !e.contains("big.py")));
        assert!(req.excerpts.iter().all(|e| !e.contains("image.png")));
    }

    #[test]
    fn test_total_char_budget_stops_excerpts() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            write(dir.path(), &format!("m{i}.go"), &"z".repeat(100));
        }
        let limits = ContentLimits {
            max_excerpt_total_chars: 150,
            ..ContentLimits::default()
        };
        let req = build_analysis_request(dir.path(), &repo(dir.path()), &limits);
        assert_eq!(req.excerpts.len(), 2);
    }

    #[test]
    fn test_index_files_filtering() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/lib.rs", "pub fn a() {}");
        write(dir.path(), "notes.txt", "free text");
        write(dir.path(), "Cargo.lock", "lock");
        write(dir.path(), "package-lock.json", "{}");
        write(dir.path(), "logo.png", "png");
        write(dir.path(), "huge.rs", &"a".repeat(60));
        write(dir.path(), "vendor/dep.go", "package dep");

        let limits = ContentLimits {
            max_index_file_bytes: 50,
            ..ContentLimits::default()
        };
        let files = collect_index_files(dir.path(), &limits);
        let keys: Vec<&str> = files.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["notes.txt", "src/lib.rs"]);
    }

    #[test]
    fn test_head_commit_from_git_repo() {
        let dir = tempfile::tempdir().unwrap();
        let git = git2::Repository::init(dir.path()).unwrap();
        write(dir.path(), "a.txt", "a");

        let mut index = git.index().unwrap();
        index.add_path(Path::new("a.txt")).unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = git.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("t", "t@example.com").unwrap();
        let oid = git.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();

        assert_eq!(head_commit(dir.path()), Some(oid.to_string()));
    }

    #[test]
    fn test_primary_language_tie_break() {
        let mut counts = HashMap::new();
        counts.insert("rust", 2);
        counts.insert("go", 2);
        counts.insert("yaml", 1);
        assert_eq!(primary_language(&counts).as_deref(), Some("go"));
        assert_eq!(primary_language(&HashMap::new()), None);
    }
}
