//! Purpose: Static registry of the scraping operations this client can submit.
//! Exports: `OperationDescriptor`, `OPERATIONS`, `lookup`.
//! Role: Maps an operation name to the vendor job type and its known inputs.
//! Invariants: Entries are defined at compile time and never mutated.
//! Invariants: Operation names are unique and double as output file stems.
use crate::core::error::{Error, ErrorKind};

pub const FACEBOOK: &str = "facebook.com";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub job_type_id: &'static str,
    pub target_label: &'static str,
    pub description: &'static str,
    pub recognized_parameters: &'static [&'static str],
}

impl OperationDescriptor {
    pub fn recognizes(&self, parameter: &str) -> bool {
        self.recognized_parameters.contains(&parameter)
    }
}

pub const OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor {
        name: "post_by_posts_url",
        job_type_id: "facebook_post_by-posts-url",
        target_label: FACEBOOK,
        description: "Get Facebook post details by posts URL",
        recognized_parameters: &["url"],
    },
    OperationDescriptor {
        name: "event_by_eventlist_url",
        job_type_id: "facebook_event_by-eventlist-url",
        target_label: FACEBOOK,
        description: "Get Facebook events by event list URL",
        recognized_parameters: &["url", "upcoming_events_only"],
    },
    OperationDescriptor {
        name: "event_by_search_url",
        job_type_id: "facebook_event_by-search-url",
        target_label: FACEBOOK,
        description: "Get Facebook events by search URL",
        recognized_parameters: &["url"],
    },
    OperationDescriptor {
        name: "event_by_events_url",
        job_type_id: "facebook_event_by-events-url",
        target_label: FACEBOOK,
        description: "Get Facebook events by events URL",
        recognized_parameters: &["url"],
    },
    OperationDescriptor {
        name: "profile_by_profiles_url",
        job_type_id: "facebook_profile_by-profiles-url",
        target_label: FACEBOOK,
        description: "Get Facebook profile information by profiles URL",
        recognized_parameters: &["url"],
    },
    OperationDescriptor {
        name: "comment_by_comments_url",
        job_type_id: "facebook_comment_by-comments-url",
        target_label: FACEBOOK,
        description: "Get Facebook post comments by comments URL",
        recognized_parameters: &["url", "get_all_replies", "limit_records", "comments_sort"],
    },
];

pub fn lookup(name: &str) -> Result<&'static OperationDescriptor, Error> {
    OPERATIONS
        .iter()
        .find(|descriptor| descriptor.name == name)
        .ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("unknown operation: {name}"))
                .with_hint("Run `fbscrape operations` to list supported operations.")
        })
}

#[cfg(test)]
mod tests {
    use super::{OPERATIONS, lookup};
    use crate::core::error::ErrorKind;
    use std::collections::HashSet;

    #[test]
    fn operation_names_are_unique() {
        let names: HashSet<_> = OPERATIONS.iter().map(|op| op.name).collect();
        assert_eq!(names.len(), OPERATIONS.len());
    }

    #[test]
    fn every_operation_accepts_url() {
        for op in OPERATIONS {
            assert_eq!(op.recognized_parameters.first(), Some(&"url"), "{}", op.name);
        }
    }

    #[test]
    fn lookup_resolves_comment_operation() {
        let op = lookup("comment_by_comments_url").expect("op");
        assert_eq!(op.job_type_id, "facebook_comment_by-comments-url");
        assert!(op.recognizes("comments_sort"));
        assert!(!op.recognizes("upcoming_events_only"));
    }

    #[test]
    fn lookup_rejects_unknown_operation() {
        let err = lookup("group_by_url").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.message(), Some("unknown operation: group_by_url"));
    }
}
