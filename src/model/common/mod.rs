/// Our question IDs are integers.
pub type QuestionId = u32;
/// Our choice IDs are integers, unique across all questions.
pub type ChoiceId = u32;
/// Voters are identified by an opaque string supplied by the identity provider.
pub type VoterId = String;
