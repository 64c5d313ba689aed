//! Line-window chunking for the RAG index.
//!
//! Content is split into windows of whole lines. A window is closed as soon
//! as adding the next line would push its whitespace-token count past
//! `max_tokens` (and it already holds at least one line). The next window
//! starts with the last `min(3, len)` lines of the closed one so neighbouring
//! chunks share context.

/// Lines carried from one chunk into the next.
pub const OVERLAP_LINES: usize = 3;

/// Split `content` into overlapping chunks of roughly `max_tokens` words.
///
/// Returns no chunks for empty content. Deterministic for identical input.
pub fn chunk_code(content: &str, max_tokens: usize) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    for line in content.split('\n') {
        let words = token_count(line);
        if current_tokens + words > max_tokens && !current.is_empty() {
            chunks.push(current.join("\n"));

            let keep = OVERLAP_LINES.min(current.len());
            current.drain(..current.len() - keep);
            current_tokens = current.iter().map(|l| token_count(l)).sum();
        }
        current.push(line);
        current_tokens += words;
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    chunks
}

fn token_count(line: &str) -> usize {
    line.split_whitespace().count()
}

/// Infer a language tag from a file path's extension.
pub fn detect_language(path: &str) -> &'static str {
    let ext = std::path::Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "go" => "go",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "rs" => "rust",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        "sh" | "bash" | "zsh" => "shell",
        "sql" => "sql",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "toml" => "toml",
        "proto" => "protobuf",
        "tf" | "hcl" => "hcl",
        "html" => "html",
        "css" | "scss" | "less" => "css",
        "md" => "markdown",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuild the original line sequence by dropping each chunk's overlap prefix.
    fn reassemble(chunks: &[String]) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        let mut prev_len = 0usize;
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_lines: Vec<&str> = chunk.split('\n').collect();
            let skip = if i == 0 { 0 } else { OVERLAP_LINES.min(prev_len) };
            lines.extend(chunk_lines[skip..].iter().map(|l| l.to_string()));
            prev_len = chunk_lines.len();
        }
        lines
    }

    #[test]
    fn test_empty_content_yields_nothing() {
        assert!(chunk_code("", 512).is_empty());
    }

    #[test]
    fn test_small_file_single_chunk() {
        let chunks = chunk_code("fn main() {\n    println!(\"hi\");\n}", 512);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("println!"));
    }

    #[test]
    fn test_whitespace_only_is_still_one_chunk() {
        let chunks = chunk_code("   \n\n", 10);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_splits_when_limit_exceeded() {
        let content = (0..20)
            .map(|i| format!("word{i} another{i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunk_code(&content, 10);
        assert!(chunks.len() > 1, "expected a split, got {}", chunks.len());
    }

    #[test]
    fn test_consecutive_chunks_share_three_lines() {
        let content = (0..40)
            .map(|i| format!("let v{i} = {i} + 1;"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunk_code(&content, 25);
        assert!(chunks.len() > 2);

        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].split('\n').collect();
            let next: Vec<&str> = pair[1].split('\n').collect();
            let overlap = OVERLAP_LINES.min(prev.len());
            assert_eq!(&prev[prev.len() - overlap..], &next[..overlap]);
        }
    }

    #[test]
    fn test_reassembly_reconstructs_original_lines() {
        let content = (0..57)
            .map(|i| format!("line {i} has a few words"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunk_code(&content, 17);
        let original: Vec<String> = content.split('\n').map(|l| l.to_string()).collect();
        assert_eq!(reassemble(&chunks), original);
    }

    #[test]
    fn test_single_oversized_line_is_its_own_chunk() {
        let long_line = vec!["tok"; 50].join(" ");
        let content = format!("short\n{long_line}\nshort again");
        let chunks = chunk_code(&content, 10);
        assert!(chunks.iter().any(|c| c.contains(&long_line)));
        let original: Vec<String> = content.split('\n').map(|l| l.to_string()).collect();
        assert_eq!(reassemble(&chunks), original);
    }

    #[test]
    fn test_deterministic() {
        let content = "a b c\nd e f\ng h i\nj k l\nm n o";
        assert_eq!(chunk_code(content, 4), chunk_code(content, 4));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("src/main.rs"), "rust");
        assert_eq!(detect_language("web/App.tsx"), "typescript");
        assert_eq!(detect_language("cmd/server/main.go"), "go");
        assert_eq!(detect_language("deploy/values.yml"), "yaml");
        assert_eq!(detect_language("README.MD"), "markdown");
        assert_eq!(detect_language("Makefile"), "unknown");
    }
}
