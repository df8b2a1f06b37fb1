//! Rendering of outbound bot messages.
//!
//! Every renderer produces a plain-text and a markdown body; Spark shows
//! the markdown where it can and falls back to the text.

use chrono::{DateTime, Utc};

use crate::models::{Person, ZabbixIssue, ZabbixStatus};

/// A rendered message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub markdown: String,
}

/// Greeting for the "hello" command.
pub fn hello(caller: &Person, contact_info: Option<&str>) -> Rendered {
    let name = caller.salutation();
    let mut text = format!(
        "Hello {}! I am the Zpark bot: I relay alerts from Zabbix and answer \
         questions about its state. Say \"show issues\" or \"show status\" to try me out.",
        name
    );
    let mut markdown = format!(
        "Hello {}! I am the **Zpark** bot: I relay alerts from Zabbix and answer \
         questions about its state. Say `show issues` or `show status` to try me out.",
        name
    );
    if let Some(contact) = contact_info {
        text.push_str(&format!(" My caretaker is {}.", contact));
        markdown.push_str(&format!(" My caretaker is {}.", contact));
    }
    Rendered { text, markdown }
}

/// The list of active Zabbix problems for "show issues".
pub fn active_issues(issues: &[ZabbixIssue], now: DateTime<Utc>) -> Rendered {
    if issues.is_empty() {
        let body = "Good news: Zabbix reports no active issues right now.".to_string();
        return Rendered {
            text: body.clone(),
            markdown: body,
        };
    }

    let mut text = format!("Zabbix reports {} active issue(s):\n", issues.len());
    let mut markdown = format!("Zabbix reports **{}** active issue(s):\n", issues.len());
    for issue in issues {
        let age = issue
            .last_change_utc()
            .map(|t| humanize_age(now.signed_duration_since(t).num_seconds()))
            .unwrap_or_else(|| "unknown age".to_string());
        text.push_str(&format!(
            "- {}: {} (since {})\n",
            issue.host, issue.description, age
        ));
        markdown.push_str(&format!(
            "- **{}**: {} _({})_\n",
            issue.host, issue.description, age
        ));
    }
    Rendered { text, markdown }
}

/// Zabbix server statistics for "show status".
pub fn server_status(status: &ZabbixStatus) -> Rendered {
    let hosts_total = status.hosts_enabled + status.hosts_disabled + status.templates;
    let items_total = status.items_enabled + status.items_disabled + status.items_unsupported;

    let lines = [
        format!("Zabbix server version: {}", status.version),
        format!(
            "Hosts (enabled / disabled / templates): {} / {} / {} ({})",
            status.hosts_enabled, status.hosts_disabled, status.templates, hosts_total
        ),
        format!(
            "Items (enabled / disabled / unsupported): {} / {} / {} ({})",
            status.items_enabled, status.items_disabled, status.items_unsupported, items_total
        ),
        format!(
            "Triggers (enabled / disabled): {} / {} [{} ok / {} in problem]",
            status.triggers_enabled,
            status.triggers_disabled,
            status.triggers_ok,
            status.triggers_problem
        ),
        format!("Users: {}", status.users),
        format!("Web scenarios: {}", status.web_scenarios),
    ];

    let text = lines.join("\n");
    let markdown = lines
        .iter()
        .map(|l| format!("- {}", l))
        .collect::<Vec<_>>()
        .join("\n");
    Rendered { text, markdown }
}

/// Sent once when a command task fails and a retry is underway.
pub fn failed_command_notice(caller: &Person) -> Rendered {
    let name = caller.salutation();
    let text = format!(
        "Sorry {}, I hit a problem answering your command. I am retrying; \
         if you hear nothing further, please tell my caretaker.",
        name
    );
    Rendered {
        markdown: text.clone(),
        text,
    }
}

fn humanize_age(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
