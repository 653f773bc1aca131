//! Record decoding
//!
//! Input records are positional string fields. A [`ColumnMapping`] says which
//! fields hold the start offset, end offset, word and link; a
//! [`RecordDecoder`] validates them and produces an [`Event`].
//!
//! ```text
//!   "cap-1,00:01:02.003,00:01:02.500,fire,0.97,search,https://.../fire.png"
//!            │             │           │                 │
//!          start          end         word              link
//!            └─────────────┴───────────┴────────┬────────┘
//!                                               ▼
//!                     Event { link, word, caption, file_name, start_at, end_at }
//!                                                  ▲
//!                                   md5(link ++ word) ++ ".png"
//! ```

pub mod decode;
pub mod duration;
pub mod event;
pub mod key;
pub mod mapping;

pub use decode::{decode, RecordDecoder};
pub use duration::parse_offset;
pub use event::Event;
pub use key::KeyScheme;
pub use mapping::ColumnMapping;
