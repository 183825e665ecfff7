use shared::types::NodeRecord;

use crate::api::routes::FlashParams;
use crate::help::{HelpTopic, RenderedTopic};

const STYLE: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: system-ui, -apple-system, sans-serif;
            background: #0f1419;
            color: #ffffff;
            line-height: 1.6;
        }
        .container { max-width: 1100px; margin: 0 auto; padding: 24px; }
        h1 { color: #7b68ee; margin-bottom: 8px; }
        .subtitle { color: #8e8e93; margin-bottom: 28px; }
        a { color: #7b68ee; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .banner { border-radius: 8px; padding: 12px 16px; margin-bottom: 20px; }
        .banner.success { background: #14321e; border: 1px solid #2e7d4f; }
        .banner.danger { background: #3a1820; border: 1px solid #b4434f; }
        .card {
            background: #1e1e1e;
            border: 1px solid #333;
            border-radius: 10px;
            padding: 20px;
            margin-bottom: 16px;
        }
        table { width: 100%; border-collapse: collapse; }
        th, td { text-align: left; padding: 8px 12px; border-bottom: 1px solid #2a2a2a; }
        th { color: #8e8e93; font-weight: 500; }
        form.inline { display: inline; }
        input, button {
            background: #14171c;
            color: #ffffff;
            border: 1px solid #333;
            border-radius: 6px;
            padding: 8px 10px;
            margin: 4px 0;
        }
        button { cursor: pointer; }
        button:hover { border-color: #7b68ee; }
        .chip {
            display: inline-block;
            border-radius: 10px;
            padding: 1px 10px;
            font-size: 0.8rem;
            border: 1px solid #555;
            color: #c7c7cc;
        }
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <div class="container">
{body}
    </div>
</body>
</html>
"#,
        title = escape(title),
    )
}

fn flash_banner(params: &FlashParams) -> String {
    match &params.flash {
        Some(message) => {
            let category = match params.category.as_deref() {
                Some("success") => "success",
                _ => "danger",
            };
            format!(
                r#"<div class="banner {category}">{}</div>"#,
                escape(message)
            )
        }
        None => String::new(),
    }
}

pub fn index(nodes: &[NodeRecord], params: &FlashParams) -> String {
    let rows: String = nodes
        .iter()
        .map(|node| {
            format!(
                r#"            <tr>
                <td><a href="/node/{id}">{name}</a></td>
                <td>{address}:{port}</td>
                <td>{created}</td>
                <td>
                    <form class="inline" method="post" action="/remove_node/{id}">
                        <button type="submit">Remove</button>
                    </form>
                </td>
            </tr>
"#,
                id = node.id,
                name = escape(&node.name),
                address = escape(&node.address),
                port = node.port,
                created = node.created_at.format("%Y-%m-%d %H:%M"),
            )
        })
        .collect();

    let table = if nodes.is_empty() {
        "        <p>No nodes registered yet.</p>\n".to_string()
    } else {
        format!(
            r#"        <table>
            <tr><th>Name</th><th>Endpoint</th><th>Added</th><th></th></tr>
{rows}        </table>
"#
        )
    };

    let body = format!(
        r#"        <h1>Node Dashboard</h1>
        <p class="subtitle"><a href="/add_node">Add node</a> &middot; <a href="/help">Help center</a></p>
{flash}        <div class="card">
{table}        </div>
"#,
        flash = flash_banner(params),
    );
    layout("Dashboard", &body)
}

pub fn add_node() -> String {
    let body = r#"        <h1>Add Node</h1>
        <p class="subtitle"><a href="/">Back to dashboard</a></p>
        <div class="card">
            <form method="post" action="/add_node">
                <label>Name<br><input name="name" required></label><br>
                <label>Address<br><input name="address" required></label><br>
                <label>Port<br><input name="port" placeholder="4449"></label><br>
                <label>Password<br><input name="password" type="password"></label><br>
                <button type="submit">Connect and add</button>
            </form>
        </div>
"#;
    layout("Add Node", body)
}

pub fn node_details(node: &NodeRecord) -> String {
    let body = format!(
        r#"        <h1>Node: {name}</h1>
        <p class="subtitle"><a href="/">Back to dashboard</a></p>
        <div class="card">
            <table>
                <tr><th>Endpoint</th><td>{address}:{port}</td></tr>
                <tr><th>Added</th><td>{created}</td></tr>
            </table>
        </div>
        <div class="card">
            <p>
                <a href="/node/{id}/data">Aggregated data</a> &middot;
                <a href="/node/{id}/connection_stats">Connection stats</a> &middot;
                <a href="/node/{id}/active_sessions">Active sessions</a> &middot;
                <a href="/node/{id}/services">Services</a>
            </p>
        </div>
        <div class="card">
            <form method="post" action="/node/{id}/stop_service">
                <label>Service id<br><input name="service_id" required></label><br>
                <button type="submit">Stop service</button>
            </form>
        </div>
"#,
        id = node.id,
        name = escape(&node.name),
        address = escape(&node.address),
        port = node.port,
        created = node.created_at.format("%Y-%m-%d %H:%M"),
    );
    layout(&format!("Node: {}", node.name), &body)
}

pub fn help_index(topics: &[HelpTopic]) -> String {
    let cards: String = topics
        .iter()
        .map(|topic| {
            format!(
                r#"        <div class="card">
            <h2><a href="/help/{id}">{title}</a> <span class="chip">{color}</span></h2>
            <p>{description}</p>
        </div>
"#,
                id = escape(&topic.id),
                title = escape(&topic.title),
                color = escape(&topic.color),
                description = escape(&topic.description),
            )
        })
        .collect();

    let body = format!(
        r#"        <h1>Help Center</h1>
        <p class="subtitle"><a href="/">Back to dashboard</a></p>
{cards}"#
    );
    layout("Help Center", &body)
}

pub fn help_topic(topic: &RenderedTopic) -> String {
    let sections: String = topic
        .sections
        .iter()
        .map(|section| {
            // Section bodies are rendered from trusted local Markdown.
            format!(
                r#"        <div class="card">
            <h2>{heading}</h2>
            {html}
        </div>
"#,
                heading = escape(&section.heading),
                html = section.html,
            )
        })
        .collect();

    let body = format!(
        r#"        <h1>{title}</h1>
        <p class="subtitle">{description} &middot; <a href="/help">All topics</a></p>
{sections}"#,
        title = escape(&topic.title),
        description = escape(&topic.description),
    );
    layout(&topic.title, &body)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
