pub mod filter;
pub mod group;
pub mod member;

pub use filter::GroupFilter;
pub use group::{member_count_label, Group, GroupPermissions, GroupSource};
pub use member::Member;
