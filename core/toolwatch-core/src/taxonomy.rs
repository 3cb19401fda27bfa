//! Static registry of known MCP tool servers.
//!
//! Entry order matters: the classifier tests taxonomy keys in this order.

use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
}

/// A data source a tool can pull from (only the hot-news tool has these).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolPlatform {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub display_name: String,
    pub category: String,
    pub description: String,
    pub functions: Vec<ToolFunction>,
    pub total_function_count: usize,
    pub platforms: Vec<ToolPlatform>,
}

struct Entry {
    id: &'static str,
    display_name: &'static str,
    category: &'static str,
    description: &'static str,
    functions: &'static [(&'static str, &'static str)],
    platforms: &'static [(u32, &'static str)],
}

const ENTRIES: &[Entry] = &[
    Entry {
        id: "mcp-server-filesystem",
        display_name: "Files",
        category: "File System",
        description: "Complete file system operation toolkit",
        functions: &[
            ("read_file", "Read file contents"),
            ("write_file", "Write file contents"),
            ("create_directory", "Create a directory"),
            ("list_directory", "List directory contents"),
            ("move_file", "Move or rename a file"),
            ("search_files", "Search for files"),
            ("get_file_info", "Get file metadata"),
            ("directory_tree", "Get the directory tree"),
            ("read_multiple_files", "Read several files at once"),
            ("edit_file", "Edit file contents"),
            ("list_allowed_directories", "List directories the server may access"),
        ],
        platforms: &[],
    },
    Entry {
        id: "mcp-server-github",
        display_name: "GitHub",
        category: "GitHub Integration",
        description: "Complete GitHub API integration",
        functions: &[
            ("get_user_profile", "Get a user profile"),
            ("list_repositories", "List repositories"),
            ("get_repository", "Get repository details"),
            ("list_issues", "List issues"),
            ("create_issue", "Create an issue"),
            ("update_issue", "Update an issue"),
            ("list_pull_requests", "List pull requests"),
            ("create_pull_request", "Create a pull request"),
            ("get_file_contents", "Get file contents"),
            ("create_file", "Create a file"),
            ("update_file", "Update a file"),
            ("delete_file", "Delete a file"),
            ("list_commits", "List commits"),
            ("get_commit", "Get commit details"),
            ("create_branch", "Create a branch"),
            ("list_branches", "List branches"),
            ("fork_repository", "Fork a repository"),
            ("star_repository", "Star a repository"),
            ("search_repositories", "Search repositories"),
            ("search_users", "Search users"),
            ("search_issues", "Search issues"),
            ("get_workflow_runs", "Get workflow runs"),
            ("list_releases", "List releases"),
            ("create_release", "Create a release"),
            ("list_collaborators", "List collaborators"),
            ("manage_webhooks", "Manage webhooks"),
        ],
        platforms: &[],
    },
    Entry {
        id: "playwright-mcp-server",
        display_name: "Playwright",
        category: "Web Automation",
        description: "Browser automation and testing toolkit",
        functions: &[
            ("navigate", "Navigate to a URL"),
            ("click", "Click an element"),
            ("fill", "Fill a form field"),
            ("type", "Type text"),
            ("screenshot", "Capture a screenshot"),
            ("get_text", "Get text content"),
            ("get_html", "Get HTML content"),
            ("wait_for_element", "Wait for an element"),
            ("select_option", "Select a dropdown option"),
            ("upload_file", "Upload a file"),
            ("download_file", "Download a file"),
            ("execute_script", "Execute JavaScript"),
            ("scroll", "Scroll the page"),
            ("hover", "Hover over an element"),
            ("drag_and_drop", "Drag and drop"),
            ("press_key", "Press a key"),
            ("go_back", "Navigate back"),
            ("go_forward", "Navigate forward"),
            ("reload", "Reload the page"),
            ("set_viewport", "Set the viewport size"),
            ("get_cookies", "Get cookies"),
            ("set_cookies", "Set cookies"),
            ("intercept_requests", "Intercept requests"),
            ("mock_responses", "Mock responses"),
            ("pdf_export", "Export to PDF"),
            ("performance_metrics", "Collect performance metrics"),
            ("network_monitoring", "Monitor network traffic"),
            ("console_logs", "Read console logs"),
            ("iframe_operations", "Operate on iframes"),
            ("mobile_simulation", "Simulate mobile devices"),
            ("accessibility_testing", "Accessibility testing"),
            ("visual_testing", "Visual regression testing"),
        ],
        platforms: &[],
    },
    Entry {
        id: "mcp-server-hotnews",
        display_name: "HotNews",
        category: "Data Retrieval",
        description: "Real-time trending news fetcher",
        functions: &[("get_hot_news", "Fetch trending news lists (multi-platform)")],
        platforms: &[
            (1, "Zhihu Hot List"),
            (2, "36Kr Hot List"),
            (3, "Baidu Trending"),
            (4, "Bilibili Hot List"),
            (5, "Weibo Hot Search"),
            (6, "Douyin Trending"),
            (7, "Hupu Hot List"),
            (8, "Douban Hot List"),
            (9, "IT News"),
        ],
    },
    Entry {
        id: "desktop-commander",
        display_name: "Desktop Commander",
        category: "System Control",
        description: "Desktop application control and system monitoring",
        functions: &[
            ("list_applications", "List running applications"),
            ("launch_application", "Launch an application"),
            ("quit_application", "Quit an application"),
            ("get_system_info", "Get system information"),
            ("monitor_resources", "Monitor system resources"),
        ],
        platforms: &[],
    },
];

static TAXONOMY: Lazy<Vec<ToolDescriptor>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|entry| {
            let functions: Vec<ToolFunction> = entry
                .functions
                .iter()
                .map(|(name, description)| ToolFunction {
                    name: name.to_string(),
                    description: description.to_string(),
                })
                .collect();
            ToolDescriptor {
                id: entry.id.to_string(),
                display_name: entry.display_name.to_string(),
                category: entry.category.to_string(),
                description: entry.description.to_string(),
                total_function_count: functions.len(),
                functions,
                platforms: entry
                    .platforms
                    .iter()
                    .map(|(id, name)| ToolPlatform {
                        id: *id,
                        name: name.to_string(),
                    })
                    .collect(),
            }
        })
        .collect()
});

/// All known tools, in classification order.
pub fn all() -> &'static [ToolDescriptor] {
    &TAXONOMY
}

pub fn lookup(tool_id: &str) -> Option<&'static ToolDescriptor> {
    TAXONOMY.iter().find(|descriptor| descriptor.id == tool_id)
}
