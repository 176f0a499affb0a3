use crate::server::ServerRouter;

mod auth;
mod interactions;
mod me;
mod posts;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(auth::routes())
        .merge(posts::routes())
        .merge(interactions::routes())
        .merge(me::routes())
}
