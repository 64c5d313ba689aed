use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;

use super::score::extract_score;
use super::Strategy;
use crate::error::{AnalyzerError, Result};
use crate::llm::AiProvider;
use crate::models::{AnalysisRequest, AnalysisResult};

/// Static description of a prompt-driven strategy.
pub struct StrategyDef {
    pub name: &'static str,
    pub description: &'static str,
    pub system_prompt: &'static str,
    pub instruction: &'static str,
}

pub const ARCHITECTURE: StrategyDef = StrategyDef {
    name: "architecture",
    description: "Architecture analysis with Mermaid diagrams",
    system_prompt: "You are a senior software architect reviewing a codebase. Write a Markdown report with these sections:
1. **Architecture Overview**: the architectural style in use (layered, hexagonal, MVC, ...)
2. **Module Dependencies**: which modules depend on which
3. **Architecture Diagram**: one Mermaid `graph TD` or `flowchart` block of components and their dependencies
4. **Issues & Improvements**: concrete problems and how to fix them
5. **Architecture Score**: a 0-10 rating with reasons

Name the real files and packages you see instead of giving generic advice.
Finish with the line: **Score: X/10**",
    instruction: "Analyze the architecture of this codebase and write the Markdown report, including the Mermaid diagram.",
};

pub const CODE_QUALITY: StrategyDef = StrategyDef {
    name: "code_quality",
    description: "Code quality, bugs, and security review",
    system_prompt: "You are a meticulous code reviewer. Write a Markdown report with these sections:
1. **Bugs & Logic Errors**: likely defects, with file paths and the code involved
2. **Security Vulnerabilities**: injection, auth bypass, data exposure
3. **Code Smells**: anti-patterns, dead code, duplication
4. **Refactoring Opportunities**: specific changes, described before and after
5. **Quality Score**: a 0-10 rating with reasons

Tag findings with 🔴 Critical, 🟡 Warning or 🟢 Info and cite the functions you looked at.
Finish with the line: **Score: X/10**",
    instruction: "Review the quality and safety of this codebase and write the Markdown report.",
};

pub const SECURITY: StrategyDef = StrategyDef {
    name: "security",
    description: "Security audit: secrets, injection, vulnerabilities",
    system_prompt: "You are an application security auditor familiar with the OWASP Top 10. Write a Markdown audit covering:
## Leaked Secrets & Sensitive Data
Hardcoded keys, tokens, passwords, committed .env files, private keys, secrets in logs.
## Injection
SQL, NoSQL, command, template and XSS injection.
## Authentication & Authorization
Missing checks, broken access control, JWT weaknesses, session handling, CSRF.
## API & Network
Input validation, rate limiting, CORS, TLS enforcement, exposed internal endpoints.
## Dependencies & Configuration
Vulnerable dependencies, insecure defaults, debug settings, missing security headers.
## Data Protection
Encryption at rest, sanitization, PII exposure, file uploads.

Rate every finding 🔴 CRITICAL, 🟠 HIGH, 🟡 MEDIUM or 🟢 LOW, point at the file and function, and show the fix.
Finish with the line: **Security Score: X/10** (10 = most secure)",
    instruction: "Audit this codebase for leaked secrets, injection flaws, authentication bypasses and the rest of the OWASP Top 10, and write the Markdown report.",
};

pub const FUNCTIONALITY: StrategyDef = StrategyDef {
    name: "functionality",
    description: "Business logic and functional flow mapping",
    system_prompt: "You are a business analyst who reads code. Write a Markdown report with these sections:
1. **Use Cases**: the distinct business use cases the code implements
2. **API Endpoints**: a table of endpoints with method and purpose
3. **Business Rules**: domain rules and validations you found
4. **Flow Diagram**: one Mermaid `sequenceDiagram` of the main user flow
5. **Gaps & Missing Functionality**: what looks unfinished
6. **Functionality Score**: a 0-10 rating with reasons

Stay specific to the code provided.
Finish with the line: **Score: X/10**",
    instruction: "Map the business functionality of this codebase and write the Markdown report, including the Mermaid sequence diagram.",
};

pub const DEVOPS: StrategyDef = StrategyDef {
    name: "devops",
    description: "DevOps, CI/CD, and infrastructure analysis",
    system_prompt: "You are a DevOps and infrastructure engineer. Write a Markdown report with these sections:
1. **Infrastructure Overview**: Docker, CI and configuration files present
2. **CI/CD Pipeline**: the pipeline that exists, or one you would add
3. **Deployment Architecture**: how the system is or should be deployed
4. **DevOps Diagram**: one Mermaid graph of the deployment or CI flow
5. **Recommendations**: concrete improvements
6. **DevOps Score**: a 0-10 rating with reasons

Reference the actual files (Dockerfile, docker-compose.yml, Makefile, workflows).
Finish with the line: **Score: X/10**",
    instruction: "Analyze the DevOps setup and infrastructure of this codebase and write the Markdown report, including the Mermaid diagram.",
};

/// Registration order used by the orchestrator.
pub const DEFAULT_STRATEGIES: [&StrategyDef; 5] =
    [&ARCHITECTURE, &CODE_QUALITY, &SECURITY, &FUNCTIONALITY, &DEVOPS];

/// A strategy that is one chat call with a fixed prompt pair.
pub struct PromptStrategy {
    def: &'static StrategyDef,
    provider: Arc<dyn AiProvider>,
}

impl PromptStrategy {
    pub fn new(def: &'static StrategyDef, provider: Arc<dyn AiProvider>) -> Self {
        Self { def, provider }
    }
}

#[async_trait]
impl Strategy for PromptStrategy {
    fn name(&self) -> &str {
        self.def.name
    }

    fn description(&self) -> &str {
        self.def.description
    }

    async fn analyze(&self, req: &AnalysisRequest) -> Result<AnalysisResult> {
        let context = build_context(req);
        let response = self
            .provider
            .chat(self.def.system_prompt, self.def.instruction, &context)
            .await
            .map_err(|e| AnalyzerError::provider(e.context(format!("{} analysis", self.def.name))))?;

        Ok(AnalysisResult {
            strategy: self.def.name.to_string(),
            score: extract_score(&response),
            summary: response,
            details: serde_json::json!({}),
        })
    }
}

/// Repository header (name, hints, indented tree) followed by the excerpts.
pub fn build_context(req: &AnalysisRequest) -> Vec<String> {
    let mut header = format!("Repository: {}\n", req.repo_name);
    if let Some(commit) = &req.commit_hash {
        let _ = writeln!(header, "Commit: {commit}");
    }
    if let Some(lang) = &req.language {
        let _ = writeln!(header, "Primary language: {lang}");
    }
    header.push_str("\nFile tree:\n");
    for path in &req.file_tree {
        let _ = writeln!(header, "  {path}");
    }

    let mut context = Vec::with_capacity(req.excerpts.len() + 1);
    context.push(header);
    context.extend(req.excerpts.iter().cloned());
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_header_and_order() {
        let req = AnalysisRequest {
            repo_name: "demo".into(),
            file_tree: vec!["src/main.rs".into(), "Cargo.toml".into()],
            excerpts: vec!["=== src/main.rs ===\nfn main() {}".into()],
            commit_hash: Some("abc123".into()),
            language: Some("rust".into()),
            ..AnalysisRequest::default()
        };
        let ctx = build_context(&req);
        assert_eq!(ctx.len(), 2);
        assert!(ctx[0].starts_with("Repository: demo\n"));
        assert!(ctx[0].contains("Commit: abc123"));
        assert!(ctx[0].contains("Primary language: rust"));
        assert!(ctx[0].ends_with("File tree:\n  src/main.rs\n  Cargo.toml\n"));
        assert_eq!(ctx[1], req.excerpts[0]);
    }

    #[test]
    fn test_context_without_hints() {
        let req = AnalysisRequest {
            repo_name: "bare".into(),
            ..AnalysisRequest::default()
        };
        let ctx = build_context(&req);
        assert_eq!(ctx, vec!["Repository: bare\n\nFile tree:\n".to_string()]);
    }

    #[test]
    fn test_default_order_and_unique_names() {
        let names: Vec<&str> = DEFAULT_STRATEGIES.iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["architecture", "code_quality", "security", "functionality", "devops"]
        );
        assert!(DEFAULT_STRATEGIES
            .iter()
            .all(|d| d.system_prompt.contains("Score: X/10")));
    }
}
