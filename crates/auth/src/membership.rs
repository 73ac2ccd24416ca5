//! Organizational membership used to decide who falls inside a visibility scope.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use warden_core::{DepartmentId, TeamId, UserId};

use crate::{RoleId, VisibilityLevel};

/// A user as seen by the engine: identity, primary role and org placement.
///
/// Callers pass users explicitly; the engine never looks up a "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: RoleId,
    #[serde(default)]
    pub team_id: Option<TeamId>,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

impl User {
    pub fn new(id: UserId, role: impl Into<RoleId>) -> Self {
        Self {
            id,
            role: role.into(),
            team_id: None,
            department_id: None,
        }
    }

    pub fn in_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn in_department(mut self, department_id: DepartmentId) -> Self {
        self.department_id = Some(department_id);
        self
    }
}

/// Team → department membership table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    team_departments: HashMap<TeamId, DepartmentId>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (TeamId, DepartmentId)>) -> Self {
        Self {
            team_departments: pairs.into_iter().collect(),
        }
    }

    pub fn department_of_team(&self, team_id: &TeamId) -> Option<DepartmentId> {
        self.team_departments.get(team_id).copied()
    }

    /// A user's department: the direct assignment, else the one their team belongs to.
    pub fn department_of(&self, user: &User) -> Option<DepartmentId> {
        user.department_id
            .or_else(|| user.team_id.as_ref().and_then(|t| self.department_of_team(t)))
    }

    /// Sorted (team, department) pairs.
    pub fn pairs(&self) -> Vec<(TeamId, DepartmentId)> {
        let mut pairs: Vec<(TeamId, DepartmentId)> =
            self.team_departments.iter().map(|(t, d)| (*t, *d)).collect();
        pairs.sort();
        pairs
    }

    pub fn len(&self) -> usize {
        self.team_departments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.team_departments.is_empty()
    }

    /// Whether a record owned by `owner` and visible at `level` can be seen by
    /// `viewer`. `None` is an anonymous viewer.
    ///
    /// Scopes are cumulative: anyone who sees a record at a narrower level also
    /// sees it at every wider one.
    pub fn is_visible_to(
        &self,
        level: VisibilityLevel,
        owner: &User,
        viewer: Option<&User>,
    ) -> bool {
        let Some(viewer) = viewer else {
            return level == VisibilityLevel::Public;
        };
        if viewer.id == owner.id {
            return true;
        }

        let same_team = matches!((owner.team_id, viewer.team_id), (Some(a), Some(b)) if a == b);
        let same_department = matches!(
            (self.department_of(owner), self.department_of(viewer)),
            (Some(a), Some(b)) if a == b
        );

        match level {
            VisibilityLevel::Owner => false,
            VisibilityLevel::Team => same_team,
            VisibilityLevel::Department => same_team || same_department,
            VisibilityLevel::Organization | VisibilityLevel::Public => true,
        }
    }
}
