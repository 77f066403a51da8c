// Job Posting Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Posting ID (UUID v4)
pub type PostingId = String;

/// Owning company identifier
pub type OwnerId = String;

/// One day in epoch milliseconds
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Longest accepted title
pub const MAX_TITLE_LEN: usize = 200;

/// Most benefits a posting may list
pub const MAX_BENEFITS: usize = 20;

/// Posting lifecycle status
///
/// Moves forward only: `PENDING_PAYMENT -> ACTIVE -> EXPIRED`, or straight
/// `PENDING_PAYMENT -> EXPIRED`. `EXPIRED` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostingStatus {
    PendingPayment,
    Active,
    Expired,
}

impl PostingStatus {
    pub const ALL: [PostingStatus; 3] = [
        PostingStatus::PendingPayment,
        PostingStatus::Active,
        PostingStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostingStatus::PendingPayment => "PENDING_PAYMENT",
            PostingStatus::Active => "ACTIVE",
            PostingStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PostingStatus::Expired)
    }

    /// Content may be edited in every non-terminal status
    pub fn is_editable(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `self -> next` is a legal forward transition
    pub fn can_transition_to(&self, next: PostingStatus) -> bool {
        matches!(
            (self, next),
            (PostingStatus::PendingPayment, PostingStatus::Active)
                | (PostingStatus::PendingPayment, PostingStatus::Expired)
                | (PostingStatus::Active, PostingStatus::Expired)
        )
    }
}

impl std::fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING_PAYMENT" => Ok(PostingStatus::PendingPayment),
            "ACTIVE" => Ok(PostingStatus::Active),
            "EXPIRED" => Ok(PostingStatus::Expired),
            other => Err(DomainError::Validation(format!(
                "Unknown posting status: {}",
                other
            ))),
        }
    }
}

/// Result reported by the payment provider for a checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success,
    Failure,
}

impl std::fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOutcome::Success => write!(f, "success"),
            PaymentOutcome::Failure => write!(f, "failure"),
        }
    }
}

/// Employment type offered by a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full-time",
            EmploymentType::PartTime => "part-time",
            EmploymentType::Contract => "contract",
            EmploymentType::Internship => "internship",
        }
    }
}

impl std::fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmploymentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full-time" => Ok(EmploymentType::FullTime),
            "part-time" => Ok(EmploymentType::PartTime),
            "contract" => Ok(EmploymentType::Contract),
            "internship" => Ok(EmploymentType::Internship),
            other => Err(DomainError::Validation(format!(
                "Unknown employment type: {}",
                other
            ))),
        }
    }
}

/// Owner-editable descriptive fields of a posting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingContent {
    pub title: String,
    pub description: String,
    pub employment_type: EmploymentType,
    pub location: String,
    pub salary_from: i64,
    pub salary_to: i64,
    #[serde(default)]
    pub benefits: Vec<String>,
}

impl PostingContent {
    /// Check field-level rules (run on create and on every edit)
    pub fn validate(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DomainError::Validation("Title cannot be empty".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(DomainError::Validation(format!(
                "Title too long (max {} characters)",
                MAX_TITLE_LEN
            )));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::Validation(
                "Description cannot be empty".to_string(),
            ));
        }
        if self.location.trim().is_empty() {
            return Err(DomainError::Validation(
                "Location cannot be empty".to_string(),
            ));
        }
        if self.salary_from < 0 || self.salary_to < 0 {
            return Err(DomainError::Validation(
                "Salary cannot be negative".to_string(),
            ));
        }
        if self.salary_from > self.salary_to {
            return Err(DomainError::Validation(format!(
                "Salary range is inverted: {} > {}",
                self.salary_from, self.salary_to
            )));
        }
        if self.benefits.len() > MAX_BENEFITS {
            return Err(DomainError::Validation(format!(
                "Too many benefits (max {})",
                MAX_BENEFITS
            )));
        }
        if self.benefits.iter().any(|b| b.trim().is_empty()) {
            return Err(DomainError::Validation(
                "Benefits cannot contain empty entries".to_string(),
            ));
        }
        Ok(())
    }

    /// Sample content (for tests only)
    pub fn new_test(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: "Build and operate the listing pipeline.".to_string(),
            employment_type: EmploymentType::FullTime,
            location: "Remote".to_string(),
            salary_from: 90_000,
            salary_to: 120_000,
            benefits: vec!["401k".to_string(), "Health insurance".to_string()],
        }
    }
}

/// Job Posting Entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    // Identity (immutable)
    pub id: PostingId,
    pub owner_id: OwnerId,
    pub listing_duration_days: u32,
    pub created_at: i64, // epoch ms

    // Lifecycle
    pub status: PostingStatus,
    pub activated_at: Option<i64>,
    pub expired_at: Option<i64>,
    pub updated_at: Option<i64>,

    // Owner-editable
    pub content: PostingContent,

    // Creation idempotency and checkout bookkeeping
    pub idempotency_key: Option<String>,
    pub checkout_session_id: Option<String>,
    pub checkout_url: Option<String>,
}

impl JobPosting {
    /// Create a new posting in `PENDING_PAYMENT`
    ///
    /// # Arguments
    ///
    /// * `id` - Unique posting ID (injected, not generated)
    /// * `owner_id` - Owning company
    /// * `content` - Descriptive fields
    /// * `listing_duration_days` - Tier duration chosen at creation
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        content: PostingContent,
        listing_duration_days: u32,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            listing_duration_days,
            created_at,
            status: PostingStatus::PendingPayment,
            activated_at: None,
            expired_at: None,
            updated_at: None,
            content,
            idempotency_key: None,
            checkout_session_id: None,
            checkout_url: None,
        }
    }

    /// Create a test posting with a deterministic ID and timestamp.
    ///
    /// IDs are `posting-1`, `posting-2`, ... and timestamps step by 1000.
    ///
    /// **Note**: tests only. Production code injects ID and time via providers.
    pub fn new_test(owner_id: impl Into<String>, listing_duration_days: u32) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(
            format!("posting-{}", counter),
            owner_id,
            PostingContent::new_test(format!("Engineer #{}", counter)),
            listing_duration_days,
            (counter * 1000) as i64,
        )
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Instant the paid duration runs out (epoch ms)
    pub fn expires_at(&self) -> i64 {
        self.created_at + i64::from(self.listing_duration_days) * MILLIS_PER_DAY
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    /// Fail with `Forbidden` unless `owner_id` owns this posting
    pub fn ensure_owned_by(&self, owner_id: &str) -> Result<()> {
        if self.is_owned_by(owner_id) {
            Ok(())
        } else {
            Err(DomainError::Forbidden {
                posting_id: self.id.clone(),
                owner_id: owner_id.to_string(),
            })
        }
    }
}
