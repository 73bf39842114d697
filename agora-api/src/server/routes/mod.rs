use crate::server::ServerRouter;

mod auth;
mod comments;
mod communities;
mod posts;
mod votes;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(votes::routes())
        .merge(communities::routes())
        .merge(auth::routes())
}
