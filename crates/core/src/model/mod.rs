mod history;
mod ids;
mod question;
mod response;
mod result;
mod session;
mod topic;

pub use ids::{ParseIdError, QuestionId, SessionId, UserId};
pub use topic::{Difficulty, EnumParseError, ExamKind, Topic};

pub use history::{HistoricalPerformance, PerformanceAggregates};
pub use question::{MIN_OPTIONS, Question, QuestionDraft};
pub use response::{QuestionResponse, TopicScore, topic_breakdown};
pub use result::ExamResult;
pub use session::{CompletionReason, ExamSession, SessionError, SessionStatus};

pub(crate) use history::round2;
