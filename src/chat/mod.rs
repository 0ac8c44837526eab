//! Chat sessions over uploaded documents
//!
//! - [`session`] - [`ChatSession`]: uploads, model selection, history
//! - [`orchestrator`] - [`RagOrchestrator`]: one retrieve-then-generate turn per question
//!
//! # Example
//!
//! ```ignore
//! use freestream::chat::{AskEvent, ChatSession};
//! use futures::StreamExt;
//!
//! let mut session = ChatSession::new(config).await?;
//! session.upload_documents(vec![UploadedFile::from_path("notes.txt")?]).await?;
//!
//! let stream = session.ask("What color is the sky?");
//! futures::pin_mut!(stream);
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         AskEvent::Citations(citations) => println!("{} sources", citations.len()),
//!         AskEvent::Token(text) => print!("{}", text),
//!     }
//! }
//! ```

pub mod orchestrator;
pub mod session;

pub use orchestrator::{AskEvent, RagOrchestrator, SessionState, NO_DOCUMENTS_MESSAGE};
pub use session::{ChatSession, LoadedDocument, SessionBuilder, UploadReport};
