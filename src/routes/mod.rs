/// Router Module Index
///
/// Routes are grouped by the path tier they fall under in [`crate::policy::classify`].
/// The access gate layered over the whole router does the actual enforcement; the
/// grouping keeps each tier's surface easy to audit.

/// Routes reachable without a principal: health, posts.
pub mod public;

/// `/api/users/**`: requires an ADMIN or USER principal, with per-handler
/// ownership refinement.
pub mod users;
