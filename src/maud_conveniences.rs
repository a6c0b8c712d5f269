use crate::auth::Identity;
use maud::{Markup, Render, html};

pub fn render_table(overall_title: impl Render, titles: Vec<&str>, items: Vec<Vec<Markup>>) -> Markup {
    html! {
        div class="container mx-auto" {
            (title(overall_title))
            div class="overflow-x-auto" {
                table class="min-w-full bg-gray-800 rounded shadow-md" {
                    thead class="bg-gray-700" {
                        tr {
                            @for title in titles {
                                th class="py-2 px-4 text-left font-semibold text-gray-300" {(title)}
                            }
                        }
                    }
                    tbody {
                        @for row in items {
                            tr {
                                @for col in row {
                                    td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(col)}
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

pub fn subtitle(s: impl Render) -> Markup {
    html! {
        h2 class="text-xl font-semibold mb-2" {(s)}
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

///htmx swaps these into the `#notifications` slot
pub fn notification(kind: NotificationKind, message: impl Render) -> Markup {
    let colour = match kind {
        NotificationKind::Success => "bg-green-700",
        NotificationKind::Error => "bg-red-700",
    };

    html! {
        div class={"p-4 rounded shadow-md " (colour)} role="alert" {
            (message)
        }
    }
}

pub fn stat_card(label: impl Render, value: impl Render) -> Markup {
    html! {
        div class="bg-gray-800 p-4 rounded shadow-md flex flex-col items-center" {
            span class="text-3xl font-bold" {(value)}
            span class="text-gray-400 uppercase text-sm" {(label)}
        }
    }
}

pub fn render_nav(identity: Option<&Identity>) -> Markup {
    html! {
        nav class="bg-gray-800 p-4 w-full fixed top-0 flex flex-row justify-between" {
            div class="flex flex-row space-x-4" {
                a href="/" class="font-bold" {"Registrar"}
                @if identity.is_some() {
                    a href="/dashboard" class="hover:text-gray-300" {"Dashboard"}
                    a href="/results" class="hover:text-gray-300" {"Results"}
                }
            }
            @if let Some(identity) = identity {
                span class="text-gray-400" {(identity.username) " (" (identity.role.as_str()) ")"}
            } @else {
                span class="text-gray-400" {"Not signed in"}
            }
        }
    }
}
