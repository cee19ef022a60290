//! Template variable substitution for system prompts (spec §6). Variables
//! are substituted in a fixed order: `{availableTools}`, `{currentDir}`,
//! `{currentTime}`, `{osInfo}`, `{gitInfo}`, `{projectInfo}`.

#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub available_tools: Vec<String>,
    pub current_dir: String,
    pub current_time: String,
    pub os_info: String,
    pub git_info: Option<String>,
    pub project_info: Option<String>,
}

impl TemplateContext {
    pub fn render(&self, template: &str) -> String {
        let mut out = template.to_string();
        out = out.replace("{availableTools}", &self.available_tools.join(", "));
        out = out.replace("{currentDir}", &self.current_dir);
        out = out.replace("{currentTime}", &self.current_time);
        out = out.replace("{osInfo}", &self.os_info);
        out = out.replace("{gitInfo}", self.git_info.as_deref().unwrap_or(""));
        out = out.replace("{projectInfo}", self.project_info.as_deref().unwrap_or(""));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_six_variables_in_order() {
        let ctx = TemplateContext {
            available_tools: vec!["read".to_string(), "edit".to_string()],
            current_dir: "/work".to_string(),
            current_time: "2026-07-26T00:00:00Z".to_string(),
            os_info: "linux".to_string(),
            git_info: Some("main@abcdef".to_string()),
            project_info: Some("niffler".to_string()),
        };
        let template = "Tools: {availableTools}\nDir: {currentDir}\nTime: {currentTime}\nOS: {osInfo}\nGit: {gitInfo}\nProject: {projectInfo}";
        let rendered = ctx.render(template);
        assert!(rendered.contains("Tools: read, edit"));
        assert!(rendered.contains("Dir: /work"));
        assert!(rendered.contains("Git: main@abcdef"));
        assert!(rendered.contains("Project: niffler"));
    }

    #[test]
    fn missing_optional_fields_substitute_empty_string() {
        let ctx = TemplateContext {
            current_dir: "/work".to_string(),
            ..Default::default()
        };
        let rendered = ctx.render("Git: [{gitInfo}] Project: [{projectInfo}]");
        assert_eq!(rendered, "Git: [] Project: []");
    }
}
