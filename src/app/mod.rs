use crate::pages::{CreateNotePage, NoteDetailsPage, NotesPage};
use crate::state::{AppContext, AppState};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    // One AppState per client session: the query cache inside it is
    // hydrated from the server snapshot before any route renders.
    provide_context(AppContext(AppState::new()));

    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("notes/action/create") view=CreateNotePage />
                <Route path=path!("notes/filter/:tag") view=NotesPage />
                <Route path=path!("notes/:id") view=NoteDetailsPage />
                <Route path=path!("") view=NotesPage />
            </Routes>
        </Router>
    }
}
