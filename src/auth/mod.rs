pub mod jwt;
pub mod social;
pub mod user_agent;

pub use jwt::{Claims, TokenKeys};
pub use social::{HttpSocialProvider, SocialAccountType, SocialProfile, SocialProvider};
pub use user_agent::UserAgent;
