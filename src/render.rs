//! Message list state behind the chat pane
//!
//! Holds one node per rendered message plus the scroll position of the
//! pane. Drawing itself lives in `ui`; this module only decides what the
//! list contains and where it is scrolled to.

/// Visual class of a rendered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    UserMessage,
    AssistantMessage,
}

impl MessageClass {
    pub fn css_class(&self) -> &'static str {
        match self {
            MessageClass::UserMessage => "user-message",
            MessageClass::AssistantMessage => "assistant-message",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MessageClass::UserMessage => "You:",
            MessageClass::AssistantMessage => "AI:",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageNode {
    pub class: MessageClass,
    pub text: String,
}

const DEFAULT_VIEWPORT_HEIGHT: u16 = 20;

#[derive(Debug)]
pub struct RenderSurface {
    nodes: Vec<MessageNode>,
    waiting: bool,
    pub scroll: u16,
    /// Inner height of the message pane, updated on every draw
    pub viewport_height: u16,
    /// Wrapped line count of the pane as last drawn
    content_height: u16,
    /// Keep the newest line in view as content grows
    follow_bottom: bool,
}

impl Default for RenderSurface {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            waiting: false,
            scroll: 0,
            viewport_height: 0,
            content_height: 0,
            follow_bottom: true,
        }
    }
}

impl RenderSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[MessageNode] {
        &self.nodes
    }

    pub fn last(&self) -> Option<&MessageNode> {
        self.nodes.last()
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Show or hide the "thinking" placeholder below the last message
    pub fn set_waiting(&mut self, waiting: bool) {
        self.waiting = waiting;
        self.scroll_to_bottom();
    }

    /// Add a new message node and scroll it into view. Returns the text
    /// the node now shows.
    pub fn append_message(&mut self, content: &str, class: MessageClass) -> String {
        tracing::debug!(class = class.css_class(), content, "append message");
        self.nodes.push(MessageNode {
            class,
            text: content.to_string(),
        });
        self.scroll_to_bottom();
        content.to_string()
    }

    /// Show the in-progress assistant reply.
    ///
    /// The trailing assistant node is overwritten with the full text so far;
    /// a new node is only created when the last node belongs to the user.
    pub fn update_streaming(&mut self, text: &str) {
        match self.nodes.last_mut() {
            Some(node) if node.class == MessageClass::AssistantMessage => {
                node.text.clear();
                node.text.push_str(text);
                self.scroll_to_bottom();
            }
            _ => {
                self.append_message(text, MessageClass::AssistantMessage);
            }
        }
    }

    /// Whether the placeholder line pair is drawn after the last node
    pub fn shows_placeholder(&self) -> bool {
        self.waiting
            && !matches!(self.nodes.last(), Some(node) if node.class == MessageClass::AssistantMessage)
    }

    /// Record the pane height and the wrapped height of its content.
    ///
    /// Called by the view on every draw, once the text has been laid out at
    /// the real width. While following, the scroll is re-pinned to the
    /// bottom here, so growth the node list alone can't predict (word
    /// wrapping, resizes) still ends with the newest line visible.
    pub fn set_layout(&mut self, height: u16, content_height: usize) {
        self.viewport_height = height;
        self.content_height = content_height.min(u16::MAX as usize) as u16;

        if self.follow_bottom {
            self.scroll = self.max_scroll();
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }

    /// Wrapped lines the pane needs, as of the last layout
    pub fn total_lines(&self) -> u16 {
        self.content_height
    }

    pub fn max_scroll(&self) -> u16 {
        let visible = if self.viewport_height > 0 {
            self.viewport_height
        } else {
            DEFAULT_VIEWPORT_HEIGHT
        };
        self.total_lines().saturating_sub(visible)
    }

    pub fn is_following_bottom(&self) -> bool {
        self.follow_bottom
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.scroll = self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow_bottom = self.scroll >= self.max_scroll();
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_bottom = self.scroll >= self.max_scroll();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_returns_text_and_adds_node() {
        let mut surface = RenderSurface::new();
        let shown = surface.append_message("hello", MessageClass::UserMessage);
        assert_eq!(shown, "hello");
        assert_eq!(
            surface.nodes(),
            &[MessageNode {
                class: MessageClass::UserMessage,
                text: "hello".to_string(),
            }]
        );
    }

    #[test]
    fn test_streaming_overwrites_trailing_assistant_node() {
        let mut surface = RenderSurface::new();
        surface.append_message("question", MessageClass::UserMessage);

        surface.update_streaming("Hel");
        surface.update_streaming("Hello wor");
        surface.update_streaming("Hello world");

        assert_eq!(surface.nodes().len(), 2);
        let last = surface.last().unwrap();
        assert_eq!(last.class, MessageClass::AssistantMessage);
        assert_eq!(last.text, "Hello world");
    }

    #[test]
    fn test_streaming_after_user_node_creates_new_node() {
        let mut surface = RenderSurface::new();
        surface.update_streaming("first reply");
        surface.append_message("next question", MessageClass::UserMessage);
        surface.update_streaming("second reply");

        let classes: Vec<&str> = surface.nodes().iter().map(|n| n.class.css_class()).collect();
        assert_eq!(classes, vec!["assistant-message", "user-message", "assistant-message"]);
        assert_eq!(surface.nodes()[0].text, "first reply");
    }

    #[test]
    fn test_layout_pins_scroll_to_bottom_while_following() {
        let mut surface = RenderSurface::new();
        surface.append_message("question", MessageClass::UserMessage);
        surface.set_layout(4, 15);
        assert_eq!(surface.scroll, 11);

        // A streamed chunk that wraps onto more lines moves the bottom too
        surface.update_streaming("a reply long enough to wrap several times");
        surface.set_layout(4, 22);
        assert_eq!(surface.scroll, 18);
        assert!(surface.is_following_bottom());
    }

    #[test]
    fn test_scrolling_up_stops_following_until_next_update() {
        let mut surface = RenderSurface::new();
        surface.append_message("question", MessageClass::UserMessage);
        surface.set_layout(4, 15);

        surface.scroll_up(5);
        assert!(!surface.is_following_bottom());
        surface.set_layout(4, 20);
        assert_eq!(surface.scroll, 6);

        surface.update_streaming("more");
        surface.set_layout(4, 24);
        assert_eq!(surface.scroll, 20);
    }

    #[test]
    fn test_manual_scroll_is_clamped() {
        let mut surface = RenderSurface::new();
        surface.append_message("a", MessageClass::UserMessage);
        surface.append_message("b", MessageClass::AssistantMessage);
        surface.set_layout(2, 6);
        let bottom = surface.scroll;
        assert_eq!(bottom, 4);

        surface.scroll_up(100);
        assert_eq!(surface.scroll, 0);
        surface.scroll_down(100);
        assert_eq!(surface.scroll, bottom);
        assert!(surface.is_following_bottom());
    }

    #[test]
    fn test_shrinking_content_clamps_scroll() {
        let mut surface = RenderSurface::new();
        surface.set_layout(4, 40);
        surface.scroll_up(10);
        surface.set_layout(4, 8);
        assert_eq!(surface.scroll, 4);
    }

    #[test]
    fn test_placeholder_only_before_first_chunk() {
        let mut surface = RenderSurface::new();
        surface.append_message("q", MessageClass::UserMessage);
        surface.set_waiting(true);
        assert!(surface.shows_placeholder());

        surface.update_streaming("a");
        assert!(!surface.shows_placeholder());
    }
}
