use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use tui_dispatch::{Component, EventContext, EventKind, EventRoutingState, HandlerResponse};
use tui_dispatch_components::style::BorderStyle;
use tui_dispatch_components::{
    BaseStyle, Padding, SelectList, SelectListBehavior, SelectListProps, SelectListStyle,
    SelectionStyle, StatusBar, StatusBarHint, StatusBarItem, StatusBarProps, StatusBarSection,
    StatusBarStyle,
};

use crate::action::Action;
use crate::state::{AppState, FocusArea, ListStatus};

const BG_BASE: Color = Color::Rgb(12, 18, 28);
const BG_PANEL: Color = Color::Rgb(20, 32, 46);
const BG_HIGHLIGHT: Color = Color::Rgb(28, 92, 110);
const TEXT_MAIN: Color = Color::Rgb(232, 242, 244);
const TEXT_DIM: Color = Color::Rgb(176, 195, 207);
const ACCENT_TEAL: Color = Color::Rgb(72, 204, 184);
const ACCENT_GOLD: Color = Color::Rgb(228, 176, 88);
const ACCENT_RED: Color = Color::Rgb(222, 96, 88);
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(tui_dispatch::ComponentId, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DexComponentId {
    Filters,
    DexList,
    Search,
}

#[derive(tui_dispatch::BindingContext, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DexContext {
    Filters,
    DexList,
    Search,
}

impl EventRoutingState<DexComponentId, DexContext> for AppState {
    fn focused(&self) -> Option<DexComponentId> {
        if self.search.active {
            return Some(DexComponentId::Search);
        }
        match self.focus {
            FocusArea::Filters => Some(DexComponentId::Filters),
            FocusArea::DexList => Some(DexComponentId::DexList),
        }
    }

    fn modal(&self) -> Option<DexComponentId> {
        self.search.active.then_some(DexComponentId::Search)
    }

    fn binding_context(&self, id: DexComponentId) -> DexContext {
        match id {
            DexComponentId::Filters => DexContext::Filters,
            DexComponentId::DexList => DexContext::DexList,
            DexComponentId::Search => DexContext::Search,
        }
    }

    fn default_context(&self) -> DexContext {
        DexContext::DexList
    }
}

pub struct DexUi {
    dex_list: SelectList,
    status_bar: StatusBar,
}

impl Default for DexUi {
    fn default() -> Self {
        Self::new()
    }
}

impl DexUi {
    pub fn new() -> Self {
        Self {
            dex_list: SelectList::new(),
            status_bar: StatusBar::new(),
        }
    }

    pub fn render(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        state: &AppState,
        event_ctx: &mut EventContext<DexComponentId>,
    ) {
        let base = Block::default().style(Style::default().bg(BG_BASE));
        frame.render_widget(base, area);
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(8),
                Constraint::Length(3),
            ])
            .split(area);

        render_filters(frame, layout[0], state, event_ctx);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(layout[1]);
        self.render_list(frame, body[0], state, event_ctx);
        render_detail(frame, body[1], state);
        self.render_footer(frame, layout[2], state);
    }

    pub fn handle_filters_event(
        &mut self,
        event: &EventKind,
        _state: &AppState,
    ) -> HandlerResponse<Action> {
        let actions = match event {
            EventKind::Key(key) => match key.code {
                KeyCode::Left | KeyCode::Char('h') => vec![Action::TypeCursorPrev],
                KeyCode::Right | KeyCode::Char('l') => vec![Action::TypeCursorNext],
                KeyCode::Char(' ') | KeyCode::Enter => vec![Action::TypeToggle],
                KeyCode::Char('c') => vec![Action::TypeFilterClear],
                _ => vec![],
            },
            _ => vec![],
        };
        handler_response(actions)
    }

    pub fn handle_list_event(
        &mut self,
        event: &EventKind,
        state: &AppState,
    ) -> HandlerResponse<Action> {
        let actions = match event {
            EventKind::Key(key) => match key.code {
                KeyCode::PageDown => vec![Action::SelectionPage(1)],
                KeyCode::PageUp => vec![Action::SelectionPage(-1)],
                KeyCode::Home => vec![Action::SelectionJumpTop],
                KeyCode::End => vec![Action::SelectionJumpBottom],
                KeyCode::Char('g') => vec![Action::SelectionJumpTop],
                KeyCode::Char('G') => vec![Action::SelectionJumpBottom],
                KeyCode::Char('r') => vec![Action::ListRetry],
                _ => {
                    let items = dex_items(state);
                    let props = SelectListProps {
                        items: &items,
                        count: items.len(),
                        selected: state.selected_index.min(items.len().saturating_sub(1)),
                        is_focused: true,
                        style: dex_list_style(),
                        behavior: SelectListBehavior {
                            show_scrollbar: true,
                            wrap_navigation: false,
                        },
                        on_select: Action::DexSelect,
                        render_item: &|item| item.clone(),
                    };
                    let actions: Vec<_> = self
                        .dex_list
                        .handle_event(event, props)
                        .into_iter()
                        .collect();
                    return handler_response(actions);
                }
            },
            EventKind::Scroll { delta, .. } => vec![Action::SelectionMove((*delta * 3) as i16)],
            _ => vec![],
        };
        handler_response(actions)
    }

    pub fn handle_search_event(
        &mut self,
        event: &EventKind,
        _state: &AppState,
    ) -> HandlerResponse<Action> {
        let actions = match event {
            EventKind::Key(key) => match key.code {
                KeyCode::Esc => vec![Action::SearchCancel],
                KeyCode::Enter => vec![Action::SearchSubmit],
                KeyCode::Backspace => vec![Action::SearchBackspace],
                KeyCode::Char(ch) => vec![Action::SearchInput(ch)],
                _ => vec![],
            },
            _ => vec![],
        };
        handler_response(actions)
    }

    fn render_list(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        state: &AppState,
        event_ctx: &mut EventContext<DexComponentId>,
    ) {
        event_ctx.set_component_area(DexComponentId::DexList, area);
        let window = state.visible_window();
        let more = if window.is_fetching {
            format!(" {}", SPINNER[(state.tick % SPINNER.len() as u64) as usize])
        } else if window.has_more {
            " +".to_string()
        } else {
            String::new()
        };
        let title = format!(
            "DEX {}/{}{more}",
            window.items.len(),
            state.filtered_len()
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(Style::default().bg(BG_PANEL).fg(TEXT_MAIN))
            .border_style(focus_border(state, FocusArea::DexList));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if let Some(placeholder) = list_placeholder(state) {
            let paragraph = Paragraph::new(placeholder).style(Style::default().fg(TEXT_DIM));
            frame.render_widget(paragraph, inner);
            return;
        }

        let items = dex_items(state);
        let props = SelectListProps {
            items: &items,
            count: items.len(),
            selected: state.selected_index.min(items.len().saturating_sub(1)),
            is_focused: state.focus == FocusArea::DexList,
            style: dex_list_style(),
            behavior: SelectListBehavior {
                show_scrollbar: true,
                wrap_navigation: false,
            },
            on_select: Action::DexSelect,
            render_item: &|item| item.clone(),
        };
        self.dex_list.render(frame, inner, props);
    }

    fn render_footer(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let status = state
            .message
            .clone()
            .unwrap_or_else(|| status_label(state).to_string());
        let status_color = match state.list_status() {
            ListStatus::Error => ACCENT_RED,
            _ => ACCENT_GOLD,
        };
        let status_span = Span::styled(status.as_str(), Style::default().fg(status_color));
        let status_items = [StatusBarItem::span(status_span)];
        let left_hints = status_hints(state);
        let center_hints = [
            StatusBarHint::new("n/N", "Gen"),
            StatusBarHint::new("v/V", "Group"),
            StatusBarHint::new("x", "Reset"),
            StatusBarHint::new("C", "Clear cache"),
        ];

        let style = StatusBarStyle {
            base: BaseStyle {
                border: Some(BorderStyle {
                    borders: Borders::ALL,
                    style: Style::default().fg(TEXT_DIM),
                    focused_style: Some(Style::default().fg(ACCENT_TEAL)),
                }),
                padding: Padding::xy(1, 0),
                bg: Some(BG_PANEL),
                fg: Some(TEXT_MAIN),
            },
            text: Style::default().fg(TEXT_DIM),
            hint_key: Style::default()
                .fg(ACCENT_TEAL)
                .add_modifier(Modifier::BOLD),
            hint_label: Style::default().fg(TEXT_DIM),
            separator: Style::default().fg(TEXT_DIM),
        };

        let props = StatusBarProps {
            left: StatusBarSection::hints(&left_hints).with_separator("  "),
            center: StatusBarSection::hints(&center_hints).with_separator("  "),
            right: StatusBarSection::items(&status_items).with_separator("  "),
            style,
            is_focused: false,
        };
        Component::<Action>::render(&mut self.status_bar, frame, area, props);
    }
}

fn render_filters(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    event_ctx: &mut EventContext<DexComponentId>,
) {
    event_ctx.set_component_area(DexComponentId::Filters, area);
    if state.search.active {
        event_ctx.set_component_area(DexComponentId::Search, area);
    }

    let search = if state.search.active {
        format!("/{}_", state.search.query)
    } else if state.search.query.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", state.search.query)
    };
    let generation = state
        .generation
        .map(|generation| format!("GEN {generation}"))
        .unwrap_or_else(|| "ALL".to_string());
    let group = match (state.selected_group(), state.filter.is_loading_membership()) {
        (Some(group), true) => format!("{} (loading)", group.name),
        (Some(group), false) => group.name.clone(),
        (None, _) if state.groups.is_loading() => "...".to_string(),
        (None, _) => "ALL".to_string(),
    };

    let accent = Style::default().fg(ACCENT_GOLD);
    let first = Line::from(vec![
        Span::raw("Search: "),
        Span::styled(search, Style::default().fg(ACCENT_TEAL)),
        Span::raw("  |  Generation: "),
        Span::styled(generation, accent),
        Span::raw("  |  Version group: "),
        Span::styled(group, accent),
    ]);

    let selected = &state.filter.criteria().tags;
    let mut type_spans = vec![Span::raw("Types: ")];
    match state.types.data() {
        Some(types) => {
            for (index, name) in types.iter().enumerate() {
                let mut style = if selected.contains(name) {
                    Style::default().fg(ACCENT_GOLD).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(TEXT_DIM)
                };
                if index == state.type_cursor && state.focus == FocusArea::Filters {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                type_spans.push(Span::styled(name.clone(), style));
                type_spans.push(Span::raw(" "));
            }
        }
        None if state.types.is_failed() => {
            type_spans.push(Span::styled("unavailable", Style::default().fg(ACCENT_RED)));
        }
        None => type_spans.push(Span::styled("...", Style::default().fg(TEXT_DIM))),
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(BG_PANEL).fg(TEXT_MAIN))
        .border_style(focus_border(state, FocusArea::Filters))
        .title("POKEDEX");
    let paragraph = Paragraph::new(Text::from(vec![first, Line::from(type_spans)]))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_detail(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("ENTRY")
        .style(Style::default().bg(BG_PANEL).fg(TEXT_MAIN))
        .border_style(Style::default().fg(TEXT_DIM));

    let label = Style::default().fg(TEXT_DIM);
    let mut lines = Vec::new();
    match state.selected_entity() {
        Some(entity) => {
            lines.push(Line::from(Span::styled(
                format!("#{:04} {}", entity.id, entity.name.to_ascii_uppercase()),
                Style::default().fg(ACCENT_TEAL).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(vec![
                Span::styled("Types: ", label),
                Span::styled(entity.tags.join(" / "), Style::default().fg(ACCENT_GOLD)),
            ]));
            if let Some(ordinal) = state
                .filter
                .criteria()
                .group_id
                .and_then(|group_id| state.filter.group(group_id))
                .and_then(|group| group.ordinal(entity.id))
            {
                lines.push(Line::from(vec![
                    Span::styled("Regional no.: ", label),
                    Span::raw(format!("{ordinal:03}")),
                ]));
            }
            lines.push(Line::from(vec![
                Span::styled("Sprite: ", label),
                Span::raw(entity.image_ref.clone()),
            ]));
        }
        None => lines.push(Line::from(Span::styled("No entry selected", label))),
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Catalog: ", label),
        Span::raw(format!(
            "{} known, {}",
            state.snapshot.len(),
            if state.snapshot.complete { "complete" } else { "partial" }
        )),
    ]));
    if state.snapshot.dropped > 0 {
        lines.push(Line::from(vec![
            Span::styled("Missing: ", label),
            Span::styled(
                state.snapshot.dropped.to_string(),
                Style::default().fg(ACCENT_RED),
            ),
        ]));
    }
    if let Some(error) = state.list.error() {
        lines.push(Line::from(Span::styled(
            format!("Paging stopped: {error} (r to retry)"),
            Style::default().fg(ACCENT_RED),
        )));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn list_placeholder(state: &AppState) -> Option<&'static str> {
    if state.filter.is_loading_membership() {
        return Some("Loading version group...");
    }
    if state.visible_len() > 0 {
        return None;
    }
    match state.list_status() {
        ListStatus::Loading => Some("Loading catalog..."),
        ListStatus::Error => Some("Catalog unavailable. Press C to retry."),
        _ if state.list.is_fetching() => Some("Searching more entries..."),
        _ => Some("No matches"),
    }
}

fn status_label(state: &AppState) -> &'static str {
    match state.list_status() {
        ListStatus::Loading => "Loading...",
        ListStatus::Error => "Catalog failed",
        ListStatus::Partial if state.population.is_loading() => "Populating...",
        ListStatus::Partial => "Partial catalog",
        ListStatus::Ready => "Ready",
    }
}

fn status_hints(state: &AppState) -> Vec<StatusBarHint<'static>> {
    if state.search.active {
        return vec![
            StatusBarHint::new("Enter", "Apply"),
            StatusBarHint::new("Esc", "Cancel"),
            StatusBarHint::new("Bksp", "Delete"),
        ];
    }
    match state.focus {
        FocusArea::Filters => vec![
            StatusBarHint::new("h/l", "Type"),
            StatusBarHint::new("Space", "Toggle"),
            StatusBarHint::new("c", "Clear"),
        ],
        FocusArea::DexList => vec![
            StatusBarHint::new("j/k", "Move"),
            StatusBarHint::new("PgUp/PgDn", "Page"),
            StatusBarHint::new("/", "Search"),
            StatusBarHint::new("r", "Retry"),
        ],
    }
}

fn dex_items(state: &AppState) -> Vec<Line<'static>> {
    state
        .visible_window()
        .items
        .into_iter()
        .map(|entity| Line::from(format!("#{:04} {}", entity.id, entity.name)))
        .collect()
}

fn dex_list_style() -> SelectListStyle {
    SelectListStyle {
        base: BaseStyle {
            border: None,
            padding: Padding::xy(1, 0),
            bg: None,
            fg: Some(TEXT_MAIN),
        },
        selection: SelectionStyle {
            style: Some(
                Style::default()
                    .bg(BG_HIGHLIGHT)
                    .fg(TEXT_MAIN)
                    .add_modifier(Modifier::BOLD),
            ),
            marker: None,
            disabled: false,
        },
        ..SelectListStyle::default()
    }
}

fn focus_border(state: &AppState, area: FocusArea) -> Style {
    if state.focus == area {
        Style::default()
            .fg(ACCENT_TEAL)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(TEXT_DIM)
    }
}

fn handler_response(actions: Vec<Action>) -> HandlerResponse<Action> {
    if actions.is_empty() {
        HandlerResponse::ignored()
    } else {
        HandlerResponse {
            actions,
            consumed: true,
            needs_render: false,
        }
    }
}
