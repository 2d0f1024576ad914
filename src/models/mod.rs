pub mod attachment;
pub mod message;
pub mod template;

pub use attachment::{
    AttachmentContent,
    AttachmentSource,
    AttachmentSpec,
    ByteStream,
    Disposition,
    ResolvedAttachment,
};
pub use message::{
    BodyKind,
    EmailOptions,
    MessageBody,
    OutgoingMessage,
    Recipients,
    SendResult,
    SenderIdentity,
};
pub use template::EmailTemplate;
