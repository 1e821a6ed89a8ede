//! A todo list driven by a provider-owned store.
//!
//! Run with `RUST_LOG=provision=debug cargo run --example todo_provider` to
//! see every store event.

use provision::{
    create_provider, use_data, use_store, Element, EventKind, Runtime, Store, StoreHandle,
    StoreOptions,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Todos {
    items: Vec<Todo>,
    filter: Filter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Todo {
    title: String,
    done: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Filter {
    #[default]
    All,
    Open,
}

fn todo_list() -> Element {
    Element::component(|cx| {
        let todos = use_data::<Todos>(cx, "todos").unwrap_or_default();
        let lines = todos
            .items
            .iter()
            .filter(|todo| todos.filter == Filter::All || !todo.done)
            .map(|todo| {
                let mark = if todo.done { "x" } else { " " };
                Element::text(format!("[{mark}] {}\n", todo.title))
            });
        Element::list(lines)
    })
}

fn footer() -> Element {
    Element::component(|cx| {
        let id = use_store::<Todos>(cx, "todos").map(|store| store.id().to_owned());
        Element::text(format!("-- store {}\n", id.unwrap_or_default()))
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let runtime = Runtime::current();
    let provider = create_provider(|title: &String| {
        let todos = Todos {
            items: vec![Todo {
                title: title.clone(),
                done: false,
            }],
            filter: Filter::All,
        };
        Store::new("todos", todos, StoreOptions::new().debug(true))
    });
    let handle = StoreHandle::new();

    runtime.render(provider.element_with_handle(
        "write the demo".to_string(),
        Element::list(vec![todo_list(), footer()]),
        Some(handle.clone()),
    ));
    print!("{}", runtime.text());

    let Some(store) = handle.get() else {
        eprintln!("provider did not mount");
        return;
    };
    store.on(EventKind::Updated, |event| {
        println!("updated: {} items", event.data.items.len());
    });

    store.update(|todos| {
        todos.items.push(Todo {
            title: "run it".to_string(),
            done: false,
        })
    });
    store.update(|todos| todos.items[0].done = true);
    runtime.frame();
    print!("{}", runtime.text());

    store.set_item("filter", Filter::Open);
    runtime.frame();
    print!("{}", runtime.text());

    runtime.unmount();
}
