use crate::{auth::Principal, include_res, models::ChatList, res};

use super::Dashboard;

pub(crate) fn render_dashboard(principal: &Principal, dashboard: &Dashboard) -> String {
    let mut lists = String::new();
    for list in &dashboard.lists {
        lists += &render_list(dashboard, list);
    }
    if dashboard.lists.is_empty() {
        lists = r#"<li class="empty">No lists yet.</li>"#.to_owned();
    }

    res::fill(
        include_res!(str, "/pages/dashboard.html"),
        &[
            ("user", res::escape(principal.label()).as_str()),
            ("lists", lists.as_str()),
            ("messages", render_messages(dashboard).as_str()),
        ],
    )
}

fn render_list(dashboard: &Dashboard, list: &ChatList) -> String {
    if let Some(draft) = dashboard.editing.draft_for_list(&list.id) {
        return res::fill(
            include_res!(str, "/pages/list_editing.html"),
            &[("draft", res::escape(draft).as_str())],
        );
    }

    let selected = dashboard.selected.as_deref() == Some(list.id.as_str());
    res::fill(
        include_res!(str, "/pages/list_item.html"),
        &[
            ("id", list.id.as_str()),
            ("class", if selected { "list selected" } else { "list" }),
            ("count", list.message_docs().count().to_string().as_str()),
            ("name", res::escape(&list.name).as_str()),
        ],
    )
}

fn render_messages(dashboard: &Dashboard) -> String {
    let Some(list) = dashboard.selected_list() else {
        return r#"<p class="hint">Select a list to see its messages.</p>"#.to_owned();
    };

    let mut messages = String::new();
    for message in &dashboard.messages {
        messages += &match dashboard.editing.draft_for_message(&message.id) {
            Some(draft) => res::fill(
                include_res!(str, "/pages/message_editing.html"),
                &[("draft", res::escape(draft).as_str())],
            ),
            None => res::fill(
                include_res!(str, "/pages/message.html"),
                &[("id", message.id.as_str()), ("content", res::markdown(&message.content).as_str())],
            ),
        };
    }

    res::fill(
        include_res!(str, "/pages/messages.html"),
        &[("name", res::escape(&list.name).as_str()), ("messages", messages.as_str())],
    )
}

/// The interstitial shown before a destructive action.
pub(crate) fn render_confirm(prompt: &str, action: &str) -> String {
    res::fill(
        include_res!(str, "/pages/confirm.html"),
        &[("action", action), ("prompt", res::escape(prompt).as_str())],
    )
}

#[cfg(test)]
mod tests {
    use super::super::{Editing, tests::principal};
    use super::*;
    use crate::models::ChatMessage;

    fn list(id: &str, name: &str) -> ChatList {
        ChatList {
            id: id.to_owned(),
            name: name.to_owned(),
            owner: Some(principal("me").user_ref()),
            created: None,
            last_modified: None,
            message_refs: Vec::new(),
        }
    }

    fn message(id: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_owned(),
            content: content.to_owned(),
            created: None,
            last_modified: None,
        }
    }

    #[test]
    fn nothing_selected() {
        let dashboard = Dashboard {
            lists: vec![list("l1", "Groceries & <stuff>")],
            ..Default::default()
        };
        let page = render_dashboard(&principal("me"), &dashboard);
        assert!(page.contains("Groceries &amp; &lt;stuff&gt;"));
        assert!(page.contains("/lists/l1/select"));
        assert!(page.contains("Select a list"));
        assert!(!page.contains(r#"action="/messages""#));
    }

    #[test]
    fn selected_list_shows_messages() {
        let dashboard = Dashboard {
            lists: vec![list("l1", "Groceries")],
            selected: Some("l1".to_owned()),
            messages: vec![message("m1", "buy *milk*")],
            editing: Editing::None,
        };
        let page = render_dashboard(&principal("me"), &dashboard);
        assert!(page.contains("list selected"));
        assert!(page.contains(r#"action="/messages""#));
        assert!(page.contains("<em>milk</em>"));
        assert!(page.contains("/messages/m1/delete"));
    }

    #[test]
    fn drafts_replace_their_entity() {
        let dashboard = Dashboard {
            lists: vec![list("l1", "Groceries")],
            selected: Some("l1".to_owned()),
            messages: vec![message("m1", "milk"), message("m2", "eggs")],
            editing: Editing::Message {
                id: "m1".to_owned(),
                draft: "oat <milk>".to_owned(),
            },
        };
        let page = render_dashboard(&principal("me"), &dashboard);
        assert!(page.contains("oat &lt;milk&gt;"));
        assert!(!page.contains("/messages/m1/edit"));
        assert!(page.contains("/messages/m2/edit"));
        assert!(page.contains(r#"action="/edit/save""#));
    }

    #[test]
    fn confirm_escapes_prompt() {
        let page = render_confirm("Delete <b>this</b>?", "/lists/l1/delete");
        assert!(page.contains("Delete &lt;b&gt;this&lt;/b&gt;?"));
        assert!(page.contains(r#"action="/lists/l1/delete""#));
        assert!(page.contains(r#"name="confirm" value="yes""#));
    }

    #[test]
    fn user_text_does_not_expand_placeholders() {
        let dashboard = Dashboard {
            lists: vec![list("l1", "{messages}")],
            selected: Some("l1".to_owned()),
            messages: vec![message("m1", "secret")],
            editing: Editing::None,
        };
        let mut me = principal("me");
        me.display_name = Some("{lists}".to_owned());

        let page = render_dashboard(&me, &dashboard);
        assert_eq!(page.matches("secret").count(), 1);
        assert_eq!(page.matches("/lists/l1/select").count(), 1);
        assert!(page.contains("<h2>{messages}</h2>"));
    }
}
