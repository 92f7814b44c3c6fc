use crate::api::{ApiErrorKind, CreateNoteRequest};
use crate::cache::{QueryKey, QueryPayload, Resource};
use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, ButtonVariant, Card, CardContent,
    CardDescription, CardHeader, CardItem, CardList, CardTitle, Input, Label, Spinner, Textarea,
};
use crate::drafts::DraftPatch;
use crate::models::{validate_note_fields, FieldError, Note, NoteTag};
use crate::state::notes_query::NotesQueryController;
use crate::state::{AppContext, ToastKind};
use crate::util::now_ms;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::{use_navigate, use_params, use_query_map};
use leptos_router::params::Params;
use strum::IntoEnumIterator;
use wasm_bindgen::JsCast;

#[derive(Params, PartialEq, Clone, Debug)]
pub struct NotesFilterParams {
    pub tag: Option<String>,
}

#[derive(Params, PartialEq, Clone, Debug)]
pub struct NoteDetailsParams {
    pub id: Option<String>,
}

/// Transient notifications, top-right. Click dismisses early; the rest
/// age out on the AppState timer.
#[component]
pub fn Toaster() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let toasts = app_state.0.toasts;

    view! {
        <div class="fixed right-4 top-4 z-50 flex w-80 flex-col gap-2">
            {move || {
                let app_state = app_state.clone();
                toasts
                    .get()
                    .into_iter()
                    .map(|toast| {
                        let app_state = app_state.clone();
                        let id = toast.id;
                        let (border, text) = match toast.kind {
                            ToastKind::Error => ("border-destructive/30", "text-destructive"),
                            ToastKind::Success => ("", ""),
                        };
                        view! {
                            <div on:click=move |_| app_state.0.dismiss_toast(id)>
                                <Alert class=format!("cursor-pointer bg-background shadow-md {}", border)>
                                    <AlertDescription class=text>{toast.message}</AlertDescription>
                                </Alert>
                            </div>
                        }
                    })
                    .collect_view()
            }}
        </div>
    }
}

#[component]
fn Pagination(
    page: RwSignal<u32>,
    #[prop(into)] total_pages: Signal<u32>,
    #[prop(into)] on_page_change: Callback<u32>,
) -> impl IntoView {
    let at_first = move || page.get() <= 1;
    let at_last = move || page.get() >= total_pages.get();

    view! {
        <div class="flex items-center gap-2">
            <Button
                variant=ButtonVariant::Outline
                size=ButtonSize::Sm
                attr:disabled=at_first
                on:click=move |_| {
                    let p = page.get_untracked();
                    if p > 1 {
                        on_page_change.run(p - 1);
                    }
                }
            >
                "<"
            </Button>

            <span class="text-xs text-muted-foreground">
                {move || format!("Page {} of {}", page.get(), total_pages.get().max(1))}
            </span>

            <Button
                variant=ButtonVariant::Outline
                size=ButtonSize::Sm
                attr:disabled=at_last
                on:click=move |_| {
                    let p = page.get_untracked();
                    on_page_change.run(p + 1);
                }
            >
                ">"
            </Button>
        </div>
    }
}

#[component]
pub fn NotesPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let params = use_params::<NotesFilterParams>();
    let query = use_query_map();

    let route_tag = move || {
        params
            .get()
            .ok()
            .and_then(|p| p.tag)
            .and_then(|segment| NoteTag::from_route_segment(&segment))
    };

    // The URL surface seeds the first key: tag from the path segment,
    // page and (pre-debounce) search from the query string.
    let initial_tag = params
        .get_untracked()
        .ok()
        .and_then(|p| p.tag)
        .and_then(|segment| NoteTag::from_route_segment(&segment));
    let initial_page = query
        .get_untracked()
        .get("page")
        .and_then(|p| p.parse::<u32>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let initial_search = query.get_untracked().get("search").unwrap_or_default();

    let controller =
        NotesQueryController::new(app_state.clone(), initial_page, initial_search, initial_tag);

    let page = controller.page;
    let raw_search = controller.raw_search;
    let current_tag = controller.tag;
    let data = controller.data;
    let loading = controller.loading;
    let fetching = controller.fetching;
    let error = controller.error;

    // Route tag changes swap the filter context (first run only seeds
    // the previous value; the controller already carries it).
    {
        let controller = controller.clone();
        Effect::new(move |prev: Option<Option<NoteTag>>| {
            let tag = route_tag();
            if let Some(prev_tag) = prev {
                if prev_tag != tag {
                    controller.set_tag(tag);
                }
            }
            tag
        });
    }

    // Assemble the key and drive the cache whenever an input moves.
    {
        let controller = controller.clone();
        Effect::new(move |_| {
            let page = page.get();
            let search = controller.settled_search.get();
            let tag = current_tag.get();
            controller.load(page, &search, tag);
        });
    }

    {
        let controller = controller.clone();
        on_cleanup(move || controller.cancel());
    }

    let total_pages = Signal::derive(move || {
        data.get().map(|d| d.total_pages).unwrap_or(1)
    });
    let notes = move || data.get().map(|d| d.notes).unwrap_or_default();
    let is_empty = move || !loading.get() && notes().is_empty();
    let has_pages = move || total_pages.get() > 1;

    let search_controller = controller.clone();
    let on_search = Callback::new(move |value: String| {
        search_controller.on_search_input(value);
    });

    let page_controller = controller.clone();
    let on_page_change = Callback::new(move |p: u32| {
        page_controller.set_page(p);
    });

    let delete_controller = StoredValue::new(controller.clone());

    view! {
        <div class="min-h-screen bg-background">
            <Toaster />

            <div class="mx-auto w-full max-w-[1080px] px-4 py-8">
                <div class="mb-4 flex items-center justify-between">
                    <div class="space-y-1">
                        <h1 class="text-xl font-semibold">"NoteHub"</h1>
                        <p class="text-xs text-muted-foreground">
                            {move || match current_tag.get() {
                                Some(tag) => format!("Notes filtered by {tag}"),
                                None => "All notes".to_string(),
                            }}
                        </p>
                    </div>

                    <a
                        href="/notes/action/create"
                        class="inline-flex h-9 items-center rounded-md bg-primary px-4 text-sm font-medium text-primary-foreground hover:bg-primary/90"
                    >
                        "Create note +"
                    </a>
                </div>

                <div class="mb-4 flex flex-wrap items-center gap-2">
                    {move || {
                        let current = current_tag.get();
                        std::iter::once((None, "All".to_string()))
                            .chain(NoteTag::iter().map(|t| (Some(t), t.to_string())))
                            .map(|(tag, label)| {
                                let href = match tag {
                                    Some(t) => format!("/notes/filter/{t}"),
                                    None => "/notes/filter/all".to_string(),
                                };
                                let active = tag == current;
                                let class = if active {
                                    "rounded-md bg-accent px-3 py-1.5 text-sm text-accent-foreground"
                                } else {
                                    "rounded-md px-3 py-1.5 text-sm text-muted-foreground hover:bg-accent hover:text-accent-foreground"
                                };
                                let aria_current = if active { Some("page") } else { None };
                                view! {
                                    <a href=href class=class aria-current=aria_current>
                                        {label}
                                    </a>
                                }
                            })
                            .collect_view()
                    }}
                </div>

                <div class="mb-4 flex flex-wrap items-center justify-between gap-3">
                    <div class="w-full max-w-xs">
                        <Input
                            r#type="search"
                            placeholder="Search notes"
                            bind_value=raw_search
                            on_value=on_search
                        />
                    </div>

                    <div class="flex items-center gap-3">
                        <Show when=move || fetching.get() fallback=|| ().into_view()>
                            <Spinner class="text-muted-foreground" />
                        </Show>

                        <Show when=has_pages fallback=|| ().into_view()>
                            <Pagination page=page total_pages=total_pages on_page_change=on_page_change />
                        </Show>
                    </div>
                </div>

                <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                    {move || {
                        error.get().map(|e| view! {
                            <Alert class="mb-4 border-destructive/30">
                                <AlertDescription class="text-destructive">{e}</AlertDescription>
                            </Alert>
                        })
                    }}
                </Show>

                <Show
                    when=move || !loading.get()
                    fallback=|| view! {
                        <div class="text-xs text-muted-foreground">"Loading notes..."</div>
                    }
                >
                    <Show
                        when=move || !is_empty()
                        fallback=|| view! {
                            <div class="text-xs text-muted-foreground">"No notes found."</div>
                        }
                    >
                        <CardList>
                            {move || {
                                notes()
                                    .into_iter()
                                    .map(|note| note_card(note, delete_controller.get_value()))
                                    .collect_view()
                            }}
                        </CardList>
                    </Show>
                </Show>
            </div>
        </div>
    }
}

fn note_card(note: Note, controller: NotesQueryController) -> impl IntoView {
    let id = note.id.clone();
    let details_href = format!("/notes/{}", urlencoding::encode(&note.id));
    let content = note.content.clone();

    view! {
        <CardItem class="flex flex-col items-start gap-2 rounded-md border px-4 py-3">
            <div class="flex w-full items-center justify-between gap-2">
                <div class="text-sm font-medium">{note.title}</div>
                <span class="rounded-full border px-2.5 py-0.5 text-xs text-muted-foreground">
                    {note.tag.to_string()}
                </span>
            </div>

            {(!content.is_empty()).then(|| view! {
                <p class="text-xs text-muted-foreground">{content.clone()}</p>
            })}

            <div class="flex items-center gap-2">
                <a class="text-xs text-primary underline underline-offset-4" href=details_href>
                    "View"
                </a>
                <Button
                    variant=ButtonVariant::Destructive
                    size=ButtonSize::Sm
                    on:click=move |_| controller.delete_note(id.clone())
                >
                    "Delete"
                </Button>
            </div>
        </CardItem>
    }
}

#[component]
pub fn NoteDetailsPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let params = use_params::<NoteDetailsParams>();

    let note: RwSignal<Option<Note>> = RwSignal::new(None);
    let loading: RwSignal<bool> = RwSignal::new(true);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let cache = app_state.0.cache.clone();
    {
        let cache = cache.clone();
        let app_state = app_state.clone();
        Effect::new(move |_| {
            // Re-runs when a de-duplicated flight completes elsewhere.
            app_state.0.cache_revision.track();

            let id = params.get().ok().and_then(|p| p.id).unwrap_or_default();
            if id.trim().is_empty() {
                return;
            }
            let key = QueryKey::note(&id);

            if let Some(entry) = cache.lookup(&key) {
                if let Some(cached) = entry.payload.as_note() {
                    note.set(Some(cached.clone()));
                    loading.set(false);
                    error.set(None);
                }
            }

            let Some(ticket) = cache.begin_fetch(&key) else {
                return;
            };

            let api = app_state.0.api_client.get_untracked();
            let cache = cache.clone();
            let revision = app_state.0.cache_revision;
            spawn_local(async move {
                match api.get_note_by_id(&id).await {
                    Ok(fetched) => {
                        if cache.complete_fetch(&ticket, QueryPayload::Note(fetched.clone()), now_ms()) {
                            note.set(Some(fetched));
                            error.set(None);
                        }
                    }
                    Err(e) => {
                        cache.fail_fetch(&ticket);
                        error.set(Some(e.to_string()));
                    }
                }
                loading.set(false);
                revision.update(|v| *v += 1);
            });
        });
    }

    view! {
        <div class="min-h-screen bg-background">
            <Toaster />

            <div class="mx-auto w-full max-w-md px-4 py-8">
                <div class="mb-6">
                    <a class="text-sm text-primary underline underline-offset-4" href="/notes/filter/all">
                        "Back to notes"
                    </a>
                </div>

                <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                    <Alert class="border-destructive/30">
                        <AlertDescription class="text-destructive">"Something went wrong."</AlertDescription>
                    </Alert>
                </Show>

                <Show when=move || error.get().is_none() fallback=|| ().into_view()>
                    <Show
                        when=move || note.get().is_some()
                        fallback=move || view! {
                            <div class="text-xs text-muted-foreground">
                                {move || if loading.get() { "Loading..." } else { "" }}
                            </div>
                        }
                    >
                        {move || {
                            note.get().map(|n| view! {
                                <Card>
                                    <CardHeader>
                                        <CardTitle>{n.title}</CardTitle>
                                        <CardDescription>{n.tag.to_string()}</CardDescription>
                                    </CardHeader>
                                    <CardContent>
                                        <p class="text-sm whitespace-pre-wrap">{n.content}</p>
                                        <p class="mt-4 text-xs text-muted-foreground">{n.created_at}</p>
                                    </CardContent>
                                </Card>
                            })
                        }}
                    </Show>
                </Show>
            </div>
        </div>
    }
}

#[component]
pub fn CreateNotePage() -> impl IntoView {
    let navigate = StoredValue::new(use_navigate());

    let on_done = Callback::new(move |_: ()| {
        navigate.with_value(|nav| nav("/notes/filter/all", Default::default()));
    });
    let on_cancel = Callback::new(move |_: ()| {
        navigate.with_value(|nav| nav("/notes/filter/all", Default::default()));
    });

    view! {
        <div class="min-h-screen bg-background">
            <Toaster />

            <div class="mx-auto w-full max-w-md px-4 py-8">
                <Card>
                    <CardHeader>
                        <CardTitle>"Create note"</CardTitle>
                        <CardDescription>
                            "The draft is saved locally as you type."
                        </CardDescription>
                    </CardHeader>
                    <CardContent>
                        <NoteForm on_done=on_done on_cancel=on_cancel />
                    </CardContent>
                </Card>
            </div>
        </div>
    }
}

#[component]
pub fn NoteForm(
    #[prop(into)] on_done: Callback<()>,
    #[prop(into)] on_cancel: Callback<()>,
) -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    // Field state starts from the persisted draft, so an abandoned
    // form picks up where it left off after a reload.
    let initial = app_state.0.draft.get_untracked();
    let title: RwSignal<String> = RwSignal::new(initial.title);
    let content: RwSignal<String> = RwSignal::new(initial.content);
    let tag: RwSignal<NoteTag> = RwSignal::new(initial.tag);

    let field_errors: RwSignal<Vec<FieldError>> = RwSignal::new(vec![]);
    let submit_error: RwSignal<Option<String>> = RwSignal::new(None);
    let submitting: RwSignal<bool> = RwSignal::new(false);

    let error_for = move |field: &'static str| {
        field_errors
            .get()
            .into_iter()
            .find(|e| e.field == field)
            .map(|e| e.message)
    };

    let persist_title = {
        let app_state = app_state.clone();
        Callback::new(move |value: String| {
            app_state.0.set_draft(DraftPatch {
                title: Some(value),
                ..Default::default()
            });
        })
    };
    let persist_content = {
        let app_state = app_state.clone();
        Callback::new(move |value: String| {
            app_state.0.set_draft(DraftPatch {
                content: Some(value),
                ..Default::default()
            });
        })
    };

    let on_tag_change = {
        let app_state = app_state.clone();
        move |ev: web_sys::Event| {
            let Some(target) = ev.target() else {
                return;
            };
            if let Some(select) = target.dyn_ref::<web_sys::HtmlSelectElement>() {
                if let Ok(parsed) = select.value().parse::<NoteTag>() {
                    tag.set(parsed);
                    app_state.0.set_draft(DraftPatch {
                        tag: Some(parsed),
                        ..Default::default()
                    });
                }
            }
        }
    };

    let on_discard = {
        let app_state = app_state.clone();
        // The button lives inside the form; stop it from submitting.
        move |ev: leptos::ev::MouseEvent| {
            ev.prevent_default();
            app_state.0.clear_draft();
            on_cancel.run(());
        }
    };

    let on_submit = {
        let app_state = app_state.clone();
        move |ev: web_sys::SubmitEvent| {
            ev.prevent_default();

            let content_val = content.get_untracked();
            let request = CreateNoteRequest {
                title: title.get_untracked().trim().to_string(),
                content: if content_val.trim().is_empty() {
                    None
                } else {
                    Some(content_val)
                },
                tag: tag.get_untracked(),
            };

            // Pre-validation: an invalid draft never leaves the process.
            let errors = validate_note_fields(
                &request.title,
                request.content.as_deref().unwrap_or_default(),
            );
            if !errors.is_empty() {
                field_errors.set(errors);
                return;
            }

            field_errors.set(vec![]);
            submit_error.set(None);
            submitting.set(true);

            let api = app_state.0.api_client.get_untracked();
            let app_state = app_state.clone();
            spawn_local(async move {
                match api.create_note(&request).await {
                    Ok(created) => {
                        // Success clears the draft and makes every
                        // notes listing refetch on its next read.
                        app_state.0.clear_draft();
                        app_state.0.cache.invalidate(Resource::Notes);
                        app_state.0.toast_success(format!("Created \"{}\"", created.title));
                        on_done.run(());
                    }
                    Err(e) => {
                        if e.kind == ApiErrorKind::Validation && !e.field_errors.is_empty() {
                            field_errors.set(e.field_errors.clone());
                        }
                        submit_error.set(Some(e.to_string()));
                        app_state.0.toast_error("Failed to create note");
                        // Draft stays as typed; nothing is cleared on failure.
                    }
                }
                submitting.set(false);
            });
        }
    };

    view! {
        <form class="flex flex-col gap-4" on:submit=on_submit>
            <div class="flex flex-col gap-2">
                <Label html_for="title">"Title"</Label>
                <Input id="title" bind_value=title on_value=persist_title required=true />
                <Show when=move || error_for("title").is_some() fallback=|| ().into_view()>
                    <span class="text-xs text-destructive">{move || error_for("title")}</span>
                </Show>
            </div>

            <div class="flex flex-col gap-2">
                <Label html_for="content">"Content"</Label>
                <Textarea id="content" bind_value=content on_value=persist_content />
                <Show when=move || error_for("content").is_some() fallback=|| ().into_view()>
                    <span class="text-xs text-destructive">{move || error_for("content")}</span>
                </Show>
            </div>

            <div class="flex flex-col gap-2">
                <Label html_for="tag">"Tag"</Label>
                <select
                    id="tag"
                    class="border-input h-9 w-full rounded-md border bg-transparent px-3 py-1 text-sm outline-none focus-visible:ring-2 focus-visible:ring-ring/50"
                    on:change=on_tag_change
                    prop:value=move || tag.get().to_string()
                >
                    {NoteTag::iter()
                        .map(|t| view! {
                            <option value=t.to_string() selected=move || tag.get() == t>
                                {t.to_string()}
                            </option>
                        })
                        .collect_view()}
                </select>
            </div>

            <Show when=move || submit_error.get().is_some() fallback=|| ().into_view()>
                {move || {
                    submit_error.get().map(|e| view! {
                        <Alert class="border-destructive/30">
                            <AlertDescription class="text-destructive">{e}</AlertDescription>
                        </Alert>
                    })
                }}
            </Show>

            <div class="flex items-center justify-end gap-2">
                <Button variant=ButtonVariant::Outline on:click=on_discard>
                    "Cancel"
                </Button>
                <Button attr:disabled=move || submitting.get()>
                    <span class="inline-flex items-center gap-2">
                        <Show when=move || submitting.get() fallback=|| ().into_view()>
                            <Spinner />
                        </Show>
                        {move || if submitting.get() { "Creating..." } else { "Add note" }}
                    </span>
                </Button>
            </div>
        </form>
    }
}
