//! Todo lists shown on the patient detail page.
//!
//! Action items, follow-up requests and vaccine action items are all "things to do for a
//! patient by a due date". Each kind is a todo-list manager; the enabled managers are
//! configured at startup and their items are merged into three sections.

use crate::{OslerError, OslerResult};
use chrono::{DateTime, NaiveDate, Utc};
use osler_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::str::FromStr;

/// The kinds of record that can appear on a patient's todo list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoKind {
    ActionItem,
    FollowupRequest,
    VaccineActionItem,
}

impl TodoKind {
    pub const ALL: [TodoKind; 3] = [
        TodoKind::ActionItem,
        TodoKind::FollowupRequest,
        TodoKind::VaccineActionItem,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ActionItem => "action_item",
            Self::FollowupRequest => "followup_request",
            Self::VaccineActionItem => "vaccine_action_item",
        }
    }
}

impl FromStr for TodoKind {
    type Err = OslerError;

    fn from_str(s: &str) -> OslerResult<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| OslerError::InvalidInput(format!("unknown todo list manager: {s}")))
    }
}

/// Shared todo semantics for records with a due date and an optional completion.
pub trait TodoItem {
    fn due_date(&self) -> NaiveDate;

    fn completion_date(&self) -> Option<DateTime<Utc>>;

    /// Priority items sort ahead of everything else.
    fn is_priority(&self) -> bool {
        false
    }

    fn is_done(&self) -> bool {
        self.completion_date().is_some()
    }

    /// Not done and due on or before `today`.
    fn is_active(&self, today: NaiveDate) -> bool {
        !self.is_done() && self.due_date() <= today
    }

    /// Not done and due after `today`.
    fn is_pending(&self, today: NaiveDate) -> bool {
        !self.is_done() && self.due_date() > today
    }

    fn to_entry(&self) -> TodoEntry;
}

/// A todo item as shown in a list, whatever its kind.
#[derive(Clone, Debug, Serialize)]
pub struct TodoEntry {
    pub kind: TodoKind,
    pub id: ShardableUuid,
    pub description: String,
    pub due_date: NaiveDate,
    pub priority: bool,
    pub completion_date: Option<DateTime<Utc>>,
    pub completion_author: Option<ShardableUuid>,
}

/// Which action a todo section links each item to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoLink {
    Done,
    Update,
}

#[derive(Clone, Debug, Serialize)]
pub struct TodoSection {
    pub title: &'static str,
    pub link: TodoLink,
    pub items: Vec<TodoEntry>,
}

/// Todo entries split into active, pending and completed.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TodoLists {
    pub active: Vec<TodoEntry>,
    pub pending: Vec<TodoEntry>,
    pub completed: Vec<TodoEntry>,
}

impl TodoLists {
    /// Add items of one kind, classifying them against `today`.
    pub fn extend<'a, T: TodoItem + 'a>(
        &mut self,
        items: impl IntoIterator<Item = &'a T>,
        today: NaiveDate,
    ) {
        for item in items {
            let entry = item.to_entry();
            if item.is_done() {
                self.completed.push(entry);
            } else if item.is_active(today) {
                self.active.push(entry);
            } else {
                self.pending.push(entry);
            }
        }
    }

    /// Sort every list: priority first then by due date, completed newest first.
    pub fn sort(&mut self) {
        for list in [&mut self.active, &mut self.pending] {
            list.sort_by_key(|e| (Reverse(e.priority), e.due_date));
        }
        self.completed
            .sort_by_key(|e| Reverse(e.completion_date));
    }

    pub fn total(&self) -> usize {
        self.active.len() + self.pending.len() + self.completed.len()
    }

    pub fn has_active_priority(&self) -> bool {
        self.active.iter().any(|e| e.priority)
    }

    /// The three titled sections rendered on the patient detail page.
    pub fn into_sections(self) -> Vec<TodoSection> {
        vec![
            TodoSection {
                title: "Active Action Items",
                link: TodoLink::Done,
                items: self.active,
            },
            TodoSection {
                title: "Pending Action Items",
                link: TodoLink::Done,
                items: self.pending,
            },
            TodoSection {
                title: "Completed Action Items",
                link: TodoLink::Update,
                items: self.completed,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Item {
        id: ShardableUuid,
        due: NaiveDate,
        done: Option<DateTime<Utc>>,
        priority: bool,
    }

    impl TodoItem for Item {
        fn due_date(&self) -> NaiveDate {
            self.due
        }

        fn completion_date(&self) -> Option<DateTime<Utc>> {
            self.done
        }

        fn is_priority(&self) -> bool {
            self.priority
        }

        fn to_entry(&self) -> TodoEntry {
            TodoEntry {
                kind: TodoKind::ActionItem,
                id: self.id,
                description: String::new(),
                due_date: self.due,
                priority: self.priority,
                completion_date: self.done,
                completion_author: None,
            }
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn item(due: u32, done: Option<u32>, priority: bool) -> Item {
        Item {
            id: ShardableUuid::new(),
            due: day(due),
            done: done.map(|d| Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()),
            priority,
        }
    }

    #[test]
    fn classifies_against_today() {
        let today = day(10);
        let items = vec![
            item(10, None, false),
            item(9, None, false),
            item(11, None, false),
            item(1, Some(5), false),
        ];

        let mut lists = TodoLists::default();
        lists.extend(&items, today);
        assert_eq!(lists.active.len(), 2);
        assert_eq!(lists.pending.len(), 1);
        assert_eq!(lists.completed.len(), 1);
        assert_eq!(lists.total(), 4);
    }

    #[test]
    fn orders_priority_then_due_date_and_completed_newest_first() {
        let today = day(20);
        let items = vec![
            item(5, None, false),
            item(8, None, true),
            item(3, None, false),
            item(1, Some(4), false),
            item(1, Some(9), false),
        ];

        let mut lists = TodoLists::default();
        lists.extend(&items, today);
        lists.sort();

        let dues: Vec<_> = lists.active.iter().map(|e| e.due_date).collect();
        assert_eq!(dues, vec![day(8), day(3), day(5)]);
        assert!(lists.has_active_priority());

        assert_eq!(lists.completed[0].id, items[4].id);
        assert_eq!(lists.completed[1].id, items[3].id);
    }

    #[test]
    fn sections_link_done_then_update() {
        let sections = TodoLists::default().into_sections();
        let titles: Vec<_> = sections.iter().map(|s| (s.title, s.link)).collect();
        assert_eq!(
            titles,
            vec![
                ("Active Action Items", TodoLink::Done),
                ("Pending Action Items", TodoLink::Done),
                ("Completed Action Items", TodoLink::Update),
            ]
        );
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!(
            "followup_request".parse::<TodoKind>().unwrap(),
            TodoKind::FollowupRequest
        );
        assert!("workup".parse::<TodoKind>().is_err());
    }
}
