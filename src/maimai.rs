//! maimai 账号绑定与成绩同步
//!
//! 一个用户 (QQ) 对应 Remi 服务中的一个 UUID，UUID 下可以挂多个命名绑定：
//! 国服账号 (`maimai_cn`)、水鱼、落雪……其中有且只有一个国服账号是"当前档案"，
//! 当前档案再关联各查分器的一个绑定。`BindResolver` 负责在这些绑定之间协调，
//! 并把机台成绩推送到各查分器。

pub mod backend;
pub mod bind;
pub mod divingfish;
pub mod error;
pub mod lxns;
pub mod remi;
pub mod resolver;
pub mod score;
pub mod track;

pub use bind::{Bind, BindType, DivingFishCredential, Profile, ProfileBindUpdate, ProviderKind};
pub use error::{BindError, RemoteError};
pub use remi::RemiClient;
pub use resolver::{BindResolver, LxnsCreateOutcome, ProviderOutcome, SourceUpdateReport};
pub use score::{Best50, Score};
pub use track::TrackId;
