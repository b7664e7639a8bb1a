/// Replies with embed friendly mirrors of Twitter/X and Instagram links
pub mod link_fix;
/// Welcomes members who completed the onboarding gate
pub mod onboarding;
