mod category;
mod entry;
pub(crate) mod key;

pub use self::category::Category;
pub use self::entry::PlaylistEntry;
pub use self::key::IdentityKey;

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace(['/', '-', '_', ' '], "")
}
