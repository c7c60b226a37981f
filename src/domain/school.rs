use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Parent,
}

/// The authenticated user on whose behalf a payment is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: u64,
    pub role: Role,
}

impl Requester {
    pub fn admin(user_id: u64) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn parent(user_id: u64) -> Self {
        Self {
            user_id,
            role: Role::Parent,
        }
    }

    /// Admins may pay for anyone; parents only for their own children.
    pub fn may_pay_for(&self, student: &Student) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Parent => student.parent_id == Some(self.user_id),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Student {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub grade: u8,
    #[serde(default)]
    pub fee_structure_id: Option<u64>,
}
