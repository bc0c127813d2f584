use session::SessionHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) session: SessionHandle,
}
