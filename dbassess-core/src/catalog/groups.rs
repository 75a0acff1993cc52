//! Exception groups.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use super::rows;
use crate::dump::Row;
use crate::models::{GroupDesc, GroupMember, GroupType};

/// Exception groups with their members and group types.
#[derive(Debug, Clone, Default)]
pub struct GroupStore {
    groups: BTreeMap<i64, GroupDesc>,
    members: HashMap<i64, Vec<GroupMember>>,
    types: HashMap<i64, GroupType>,
    member_count: usize,
}

impl GroupStore {
    /// Builds the store from the three group dumps.
    pub fn from_rows(descs: Vec<Row>, members: Vec<Row>, types: Vec<Row>) -> Self {
        Self::from_records(
            descs.iter().filter_map(rows::group_desc),
            members.iter().filter_map(rows::group_member),
            types.iter().filter_map(rows::group_type),
        )
    }

    /// Builds the store from records.
    pub fn from_records(
        descs: impl IntoIterator<Item = GroupDesc>,
        members: impl IntoIterator<Item = GroupMember>,
        types: impl IntoIterator<Item = GroupType>,
    ) -> Self {
        let mut store = Self {
            groups: descs.into_iter().map(|g| (g.id, g)).collect(),
            types: types.into_iter().map(|t| (t.id, t)).collect(),
            ..Self::default()
        };
        for member in members {
            store.members.entry(member.group_id).or_default().push(member);
            store.member_count = store.member_count.saturating_add(1);
        }
        store
    }

    /// Looks up a group by id.
    pub fn group(&self, group_id: i64) -> Option<&GroupDesc> {
        self.groups.get(&group_id)
    }

    /// Looks up a group by description, ignoring case.
    pub fn group_by_description(&self, description: &str) -> Option<&GroupDesc> {
        self.groups
            .values()
            .find(|g| g.description.eq_ignore_ascii_case(description.trim()))
    }

    /// All groups, ordered by id.
    pub fn groups(&self) -> impl Iterator<Item = &GroupDesc> {
        self.groups.values()
    }

    /// Members of a group, in file order.
    pub fn members(&self, group_id: i64) -> &[GroupMember] {
        self.members
            .get(&group_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Looks up a group type by id.
    pub fn group_type(&self, group_type_id: i64) -> Option<&GroupType> {
        self.types.get(&group_type_id)
    }

    /// True when `value` is listed in the group.
    ///
    /// Groups whose type allows regular expressions match members as
    /// anchored patterns; invalid patterns never match. Other groups compare
    /// literally.
    pub fn is_member(&self, group_id: i64, value: &str) -> bool {
        let allow_regex = self
            .group(group_id)
            .and_then(|g| self.group_type(g.group_type_id))
            .is_some_and(|t| t.allow_regex);

        self.members(group_id).iter().any(|m| {
            if allow_regex {
                match Regex::new(&format!("^(?:{})$", m.member)) {
                    Ok(pattern) => pattern.is_match(value),
                    Err(e) => {
                        tracing::debug!(group_id, error = %e, "Ignoring invalid group member pattern");
                        false
                    }
                }
            } else {
                m.member == value
            }
        })
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of members across all groups.
    pub fn member_count(&self) -> usize {
        self.member_count
    }

    /// True when no groups loaded.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
