pub mod contact;
pub mod conversation;
pub mod favourite;
pub mod message;
pub mod notification;
pub mod user;

pub use contact::{BlockedUserRecord, ContactRecord, ContactRequestRecord};
pub use conversation::{
    ConversationActionRow, ConversationCountRecord, ConversationListRecord, ConversationRecord,
    SharedConversationRecord,
};
pub use favourite::FavouriteRecord;
pub use message::{IndexableMessageRecord, MessageRecord, MessageSearchRecord};
pub use notification::NotificationRecord;
pub use user::{ConversationUserRecord, CourseGroupRecord, UserRecord};
