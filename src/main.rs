use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tui_dispatch::{
    EffectContext, EffectStoreLike, EffectStoreWithMiddleware, EventBus, EventKind,
    HandlerResponse, Keybindings,
};
use tui_dispatch_debug::debug::DebugLayer;
use tui_dispatch_debug::{
    DebugRunOutput, DebugSession, DebugSessionError, ReplayItem,
};

use pokedex::action::Action;
use pokedex::api::PokeApiClient;
use pokedex::config::Cli;
use pokedex::effect::Effect;
use pokedex::logging::init_logging;
use pokedex::reducer::reducer;
use pokedex::state::AppState;
use pokedex::store::open_store;
use pokedex::tasks::Services;
use pokedex::ui::{DexComponentId, DexContext, DexUi};

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli.log_level, &cli.log_path()) {
        eprintln!("logging disabled: {err}");
    }

    let client = Arc::new(
        PokeApiClient::new(cli.api_base.clone()).with_group_concurrency(cli.group_concurrency),
    );
    let store = open_store(cli.store, &cli.cache_root());
    let services = Services::new(client.clone(), client, store, cli.cache_settings());
    tracing::info!(api = %cli.api_base, store = ?cli.store, "pokedex starting");

    let page_size = cli.page_size;
    let debug = DebugSession::new(cli.debug);

    let state = debug
        .load_state_or_else_async(move || async move {
            Ok::<AppState, io::Error>(AppState::new(page_size))
        })
        .await
        .map_err(debug_error)?;
    let replay_actions = debug.load_replay_items().map_err(debug_error)?;
    let (middleware, recorder) = debug.middleware_with_recorder();
    let store = EffectStoreWithMiddleware::new(state, reducer, middleware);

    let use_alt_screen = debug.use_alt_screen();
    let mut stdout = io::stdout();
    if use_alt_screen {
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &debug, store, replay_actions, services).await;

    if use_alt_screen {
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
    }

    let run_output = result?;
    run_output.write_render_output()?;
    debug.save_actions(recorder.as_ref()).map_err(debug_error)?;
    tracing::info!("pokedex stopped");
    Ok(())
}

fn debug_error(error: DebugSessionError) -> io::Error {
    io::Error::other(format!("debug session error: {error}"))
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    debug: &DebugSession,
    store: impl EffectStoreLike<AppState, Action, Effect>,
    replay_actions: Vec<ReplayItem<Action>>,
    services: Services,
) -> io::Result<DebugRunOutput<AppState>> {
    let ui = Rc::new(RefCell::new(DexUi::new()));
    let mut bus: EventBus<AppState, Action, DexComponentId, DexContext> = EventBus::new();
    let keybindings: Keybindings<DexContext> = Keybindings::new();

    let ui_filters = Rc::clone(&ui);
    bus.register(DexComponentId::Filters, move |event, state| {
        ui_filters
            .borrow_mut()
            .handle_filters_event(&event.kind, state)
    });

    let ui_list = Rc::clone(&ui);
    bus.register(DexComponentId::DexList, move |event, state| {
        ui_list.borrow_mut().handle_list_event(&event.kind, state)
    });

    let ui_search = Rc::clone(&ui);
    bus.register(DexComponentId::Search, move |event, state| {
        ui_search
            .borrow_mut()
            .handle_search_event(&event.kind, state)
    });

    bus.register_global(|event, state| match event.kind {
        EventKind::Resize(width, height) => {
            HandlerResponse::action(Action::UiTerminalResize(width, height)).with_render()
        }
        EventKind::Key(key) if !state.search.active => match key.code {
            KeyCode::Char('q') => HandlerResponse::action(Action::Quit),
            KeyCode::Tab => HandlerResponse::action(Action::FocusNext),
            KeyCode::BackTab => HandlerResponse::action(Action::FocusPrev),
            KeyCode::Char('/') => HandlerResponse::action(Action::SearchStart),
            KeyCode::Char('n') => HandlerResponse::action(Action::GenerationNext),
            KeyCode::Char('N') => HandlerResponse::action(Action::GenerationPrev),
            KeyCode::Char('v') => HandlerResponse::action(Action::GroupNext),
            KeyCode::Char('V') => HandlerResponse::action(Action::GroupPrev),
            KeyCode::Char('x') => HandlerResponse::action(Action::FiltersClear),
            KeyCode::Char('C') => HandlerResponse::action(Action::CacheClear),
            _ => HandlerResponse::ignored(),
        },
        _ => HandlerResponse::ignored(),
    });

    debug
        .run_effect_app_with_bus(
            terminal,
            store,
            DebugLayer::simple(),
            replay_actions,
            Some(Action::Init),
            Some(Action::Quit),
            |runtime| {
                if debug.render_once() {
                    return;
                }
                runtime
                    .subscriptions()
                    .interval("tick", Duration::from_millis(120), || Action::Tick);
            },
            &mut bus,
            &keybindings,
            |frame, area, state, _render_ctx, event_ctx| {
                ui.borrow_mut().render(frame, area, state, event_ctx);
            },
            |action| matches!(action, Action::Quit),
            move |effect, ctx| handle_effect(effect, ctx, &services),
        )
        .await
}

fn handle_effect(effect: Effect, ctx: &mut EffectContext<Action>, services: &Services) {
    let key = Services::task_key(&effect);
    tracing::debug!(?effect, "spawning effect");
    let services = services.clone();
    ctx.tasks().spawn(key, services.run(effect));
}
