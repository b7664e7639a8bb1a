pub mod developer;
pub mod fun;
pub mod gametags;
pub mod help;
pub mod kok;

use crate::discord::{Data, Error};

/// Every command of every module, toggling modules only gates them.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        help::help(),
        developer::extension(),
        developer::sync_slash(),
        developer::clear_slash(),
        gametags::search_game(),
        gametags::search_platform(),
        gametags::list(),
        gametags::play(),
        gametags::platform(),
        gametags::drop_tags(),
        gametags::players(),
        gametags::tag_game(),
        gametags::tag_platform(),
        gametags::prune_tag(),
        gametags::prune_all(),
        fun::buster(),
        fun::waifu(),
        fun::clown(),
        kok::kok_report(),
        kok::kok_challenge(),
    ]
}
